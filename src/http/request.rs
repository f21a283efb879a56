//! Request handling: client address propagation.
//!
//! # Responsibilities
//! - Work out the caller's address (peer, or an upstream redirector's
//!   X-Forwarded-For)
//! - Set X-Forwarded-For to the peer address when the caller did not send one
//!
//! # Design Decisions
//! - A caller-supplied X-Forwarded-For is left untouched; redirectors in
//!   front of the listener already put the agent's address there

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Header carrying the original client address.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Peer address recorded by the server, if any.
pub fn peer_addr<B>(request: &Request<B>) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Client IP for logging: first X-Forwarded-For entry, else the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "-".to_string())
}

/// Set X-Forwarded-For from the peer when absent.
pub fn propagate_client_ip<B>(request: &mut Request<B>) {
    let present = request
        .headers()
        .get(X_FORWARDED_FOR)
        .map(|v| !v.as_bytes().is_empty())
        .unwrap_or(false);
    if present {
        return;
    }

    if let Some(peer) = peer_addr(request) {
        if let Ok(value) = HeaderValue::from_str(&peer.ip().to_string()) {
            request.headers_mut().insert(X_FORWARDED_FOR, value);
        }
    }
}

/// Middleware form of [`propagate_client_ip`].
pub async fn client_ip_middleware(mut request: Request<Body>, next: Next) -> Response {
    propagate_client_ip(&mut request);
    next.run(request).await
}
