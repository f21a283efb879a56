//! Reverse proxy forwarding to the Mythic server.
//!
//! # Responsibilities
//! - Rewrite scheme, authority and path of a matched request
//! - Tag the request so the server knows which profile it came through
//! - Stream request and response bodies without buffering
//! - Turn upstream failures into 502 for the caller
//!
//! # Design Decisions
//! - One pooled client per instance; the pool owns its own locking
//! - 30s connect timeout, at most 10 idle connections kept
//! - The backend link is trusted: its TLS certificate is not verified

use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::net::tls::{backend_client_config, TlsError};
use crate::routing::ForwardTarget;

/// Marker header name added to every forwarded request.
pub const PROFILE_MARKER_HEADER: &str = "mythic";

/// Marker header value identifying this profile.
pub const PROFILE_MARKER_VALUE: &str = "http";

/// Backend dial timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connections kept per backend host.
pub const MAX_IDLE_CONNECTIONS: usize = 10;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

/// Error type for forwarding.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid backend scheme {0:?}")]
    Scheme(String),
    #[error("invalid backend address {0:?}")]
    Authority(String),
    #[error("invalid backend path {0:?}")]
    Path(String),
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// Recorded on 502 responses so the access log can report what went wrong.
#[derive(Debug, Clone)]
pub struct ForwardFailure(pub String);

type BackendClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Forwards matched requests to the backend.
#[derive(Clone)]
pub struct Forwarder {
    client: BackendClient,
    scheme: Scheme,
    authority: Authority,
    host_header: HeaderValue,
}

impl Forwarder {
    /// Build a forwarder and its connection pool.
    pub fn new(backend: &BackendConfig) -> Result<Self, ForwardError> {
        let scheme = match backend.scheme.to_ascii_lowercase().as_str() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(ForwardError::Scheme(other.to_string())),
        };
        let authority_str = backend.authority();
        let authority = Authority::from_str(&authority_str)
            .map_err(|_| ForwardError::Authority(authority_str.clone()))?;
        let host_header = HeaderValue::from_str(authority.as_str())
            .map_err(|_| ForwardError::Authority(authority_str))?;

        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(CONNECT_TIMEOUT));
        http.enforce_http(false);

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(backend_client_config()?)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS)
            .build(connector);

        Ok(Self {
            client,
            scheme,
            authority,
            host_header,
        })
    }

    /// Backend URI for a target, keeping the original query string.
    pub fn backend_uri(&self, target: &ForwardTarget, original: &Uri) -> Result<Uri, ForwardError> {
        let path = target.backend_path();
        let path_and_query = match original.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path,
        };
        let path_and_query = PathAndQuery::from_str(&path_and_query)
            .map_err(|_| ForwardError::Path(path_and_query.clone()))?;

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| ForwardError::Path(e.to_string()))
    }

    /// Rewrite the request in place for the backend.
    pub fn rewrite(&self, target: &ForwardTarget, request: &mut Request<Body>) -> Result<(), ForwardError> {
        *request.uri_mut() = self.backend_uri(target, request.uri())?;
        *request.version_mut() = Version::HTTP_11;

        let headers = request.headers_mut();
        strip_hop_by_hop(headers);
        headers.insert(header::HOST, self.host_header.clone());
        headers.append(
            HeaderName::from_static(PROFILE_MARKER_HEADER),
            HeaderValue::from_static(PROFILE_MARKER_VALUE),
        );
        Ok(())
    }

    /// Forward a request and relay the backend's response.
    pub async fn forward(&self, target: &ForwardTarget, mut request: Request<Body>) -> Response {
        if let Err(e) = self.rewrite(target, &mut request) {
            tracing::error!(error = %e, "Failed to build backend request");
            return bad_gateway(e);
        }

        match self.client.request(request).await {
            Ok(response) => relay(response),
            Err(e) => {
                let e = ForwardError::from(e);
                tracing::warn!(backend = %self.authority, error = %e, "Upstream error");
                bad_gateway(e)
            }
        }
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("scheme", &self.scheme)
            .field("authority", &self.authority)
            .finish()
    }
}

fn bad_gateway(error: ForwardError) -> Response {
    let mut response = StatusCode::BAD_GATEWAY.into_response();
    response
        .extensions_mut()
        .insert(ForwardFailure(error.to_string()));
    response
}

/// Hand the backend response to the client, body streamed as-is.
fn relay(response: hyper::Response<hyper::body::Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    // Upgrade is not proxied; agent traffic is plain request/response.
    headers.remove(header::UPGRADE);
}
