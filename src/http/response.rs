//! Response handling.
//!
//! # Responsibilities
//! - Put the instance's configured headers on every response
//! - Turn a handler panic into a 500 without taking the listener down
//! - Plain-text 404/405 for requests no route accepts

use std::any::Any;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::InstanceConfig;

/// Message of a caught panic, recorded for the access log.
#[derive(Debug, Clone)]
pub struct PanicMessage(pub String);

/// Wrap `router` so every response carries the instance's headers.
///
/// Headers that fail to parse were already rejected by validation; any that
/// slip through are skipped with a warning.
pub fn with_server_headers<S>(mut router: Router<S>, config: &InstanceConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    for (name, value) in &config.headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                router = router.layer(SetResponseHeaderLayer::overriding(name, value));
            }
            _ => tracing::warn!(header = %name, "Skipping invalid response header"),
        }
    }
    router
}

/// Response for a caught panic.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        Some(s.clone())
    } else {
        err.downcast_ref::<&str>().map(|s| s.to_string())
    };

    tracing::error!(panic = message.as_deref().unwrap_or("<non-string payload>"), "Request handler panicked");

    let mut response = match &message {
        Some(msg) => {
            let body = serde_json::json!({ "error": format!("error: {}", msg) }).to_string();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };
    response.extensions_mut().insert(PanicMessage(
        message.unwrap_or_else(|| "panic".to_string()),
    ));
    response
}

pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found").into_response()
}

pub fn method_not_allowed(allowed: &[Method]) -> Response {
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let mut response = (StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed").into_response();
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}
