//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use mythic_http::config::{BackendConfig, Config, InstanceConfig};
use mythic_http::lifecycle::{StartupError, Supervisor};

/// Start a mock Mythic server that echoes each request back as JSON.
///
/// The response body has `method`, `path`, `query`, `headers` and `body`;
/// every response carries `x-backend: mock`.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
        .collect();

    (
        [("x-backend", "mock")],
        Json(json!({
            "method": method.as_str(),
            "path": uri.path(),
            "query": uri.query().unwrap_or_default(),
            "headers": headers,
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

/// Backend settings pointing at a mock server.
pub fn backend_at(addr: SocketAddr) -> BackendConfig {
    BackendConfig {
        scheme: "http".into(),
        host: addr.ip().to_string(),
        port: addr.port(),
    }
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Plaintext loopback instance on an ephemeral port.
pub fn loopback_instance() -> InstanceConfig {
    let mut config = InstanceConfig::plain(0);
    config.bind_ip = "127.0.0.1".into();
    config
}

/// A running set of listeners.
pub struct TestListeners {
    pub addrs: Vec<SocketAddr>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), StartupError>>,
}

impl TestListeners {
    pub async fn start(instances: Vec<InstanceConfig>, backend: BackendConfig) -> Self {
        let config = Config { instances };
        let supervisor = Supervisor::launch(&config, &backend, std::time::Duration::from_secs(1))
            .await
            .expect("listeners start");
        let addrs = supervisor.local_addrs().to_vec();

        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(supervisor.run_until(async move {
            let _ = stopped.await;
        }));

        Self {
            addrs,
            stop: Some(stop),
            task,
        }
    }

    pub fn url(&self, instance: usize, path: &str) -> String {
        format!("http://{}{}", self.addrs[instance], path)
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let result = (&mut self.task).await.expect("supervisor task");
        assert!(result.is_ok(), "supervisor failed: {:?}", result.err());
    }
}

/// HTTP client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Decode the echo backend's view of a forwarded request.
pub async fn echoed(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}
