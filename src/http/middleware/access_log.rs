//! Access log middleware.
//! Times each request and logs it when the owning instance has `debug` set.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, Version},
    middleware::Next,
    response::Response,
};

use crate::http::forward::ForwardFailure;
use crate::http::request::{client_ip, peer_addr};
use crate::http::response::PanicMessage;

/// Per-instance access log settings.
#[derive(Clone, Debug)]
pub struct AccessLog {
    /// Instance index, 1-based, as shown at startup.
    pub instance: usize,
    pub enabled: bool,
}

/// One finished request.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRecord {
    pub client_ip: String,
    pub method: String,
    pub path: String,
    pub protocol: &'static str,
    pub status: StatusCode,
    pub latency: Duration,
    pub error: String,
}

impl AccessRecord {
    fn emit(&self, instance: usize) {
        tracing::info!(
            target: "access_log",
            instance,
            client_ip = %self.client_ip,
            method = %self.method,
            path = %self.path,
            protocol = self.protocol,
            status_code = self.status.as_u16(),
            latency = ?self.latency,
            error = %self.error,
            "WebServer Logging"
        );
    }
}

pub fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/?",
    }
}

/// Error summary carried on the response, if any.
fn error_summary(response: &Response) -> String {
    if let Some(PanicMessage(msg)) = response.extensions().get::<PanicMessage>() {
        return format!("panic: {}", msg);
    }
    response
        .extensions()
        .get::<ForwardFailure>()
        .map(|ForwardFailure(msg)| msg.clone())
        .unwrap_or_default()
}

pub async fn access_log_middleware(
    State(log): State<AccessLog>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !log.enabled {
        return next.run(req).await;
    }

    let start = Instant::now();
    let client_ip = client_ip(req.headers(), peer_addr(&req));
    let method = req.method().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let protocol = protocol_name(req.version());

    let response = next.run(req).await;

    let record = AccessRecord {
        client_ip,
        method,
        path,
        protocol,
        status: response.status(),
        latency: start.elapsed(),
        error: error_summary(&response),
    };
    record.emit(log.instance);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::extract::ConnectInfo;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{middleware, Router};
    use tower::ServiceExt;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run one GET through the middleware and return what was logged.
    async fn logged_request(enabled: bool) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let app = Router::new()
            .route("/index", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                AccessLog { instance: 2, enabled },
                access_log_middleware,
            ));
        let mut request = Request::builder().uri("/index?q=abc").body(Body::empty()).unwrap();
        let peer: SocketAddr = "10.2.3.4:5555".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        captured.contents()
    }

    #[tokio::test]
    async fn enabled_instance_logs_each_request() {
        let output = logged_request(true).await;
        assert!(output.contains("WebServer Logging"), "{output}");
        assert!(output.contains("access_log"));
        assert!(output.contains("client_ip=10.2.3.4"));
        assert!(output.contains("method=GET"));
        assert!(output.contains("path=/index?q=abc"));
        assert!(output.contains("HTTP/1.1"));
        assert!(output.contains("status_code=200"));
        assert!(output.contains("instance=2"));
    }

    #[tokio::test]
    async fn disabled_instance_logs_nothing() {
        let output = logged_request(false).await;
        assert!(!output.contains("WebServer Logging"), "{output}");
    }

    #[test]
    fn summary_prefers_panic() {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(PanicMessage("boom".into()));
        response.extensions_mut().insert(ForwardFailure("refused".into()));
        assert_eq!(error_summary(&response), "panic: boom");
    }

    #[test]
    fn summary_reports_forward_failure() {
        let mut response = StatusCode::BAD_GATEWAY.into_response();
        response.extensions_mut().insert(ForwardFailure("connection refused".into()));
        assert_eq!(error_summary(&response), "connection refused");
        assert_eq!(error_summary(&StatusCode::OK.into_response()), "");
    }

    #[test]
    fn protocol_names() {
        assert_eq!(protocol_name(Version::HTTP_11), "HTTP/1.1");
        assert_eq!(protocol_name(Version::HTTP_2), "HTTP/2.0");
    }
}
