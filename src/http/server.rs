//! HTTP server setup for one listening instance.
//!
//! # Responsibilities
//! - Create the Axum Router for an instance
//! - Wire up the middleware chain (access log, response headers, panic
//!   isolation, client address)
//! - Provision TLS material and bind before serving
//! - Dispatch requests through the route table to the forwarder
//!
//! # Middleware order (outermost first)
//! ```text
//! access log → server headers → catch panic → X-Forwarded-For → proxy_handler
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::InstanceConfig;
use crate::http::forward::Forwarder;
use crate::http::middleware::{access_log_middleware, AccessLog};
use crate::http::request::client_ip_middleware;
use crate::http::response::{method_not_allowed, not_found, panic_response, with_server_headers};
use crate::net::{ensure_certificate, load_tls_config, BoundListener, ListenerError, TlsError};
use crate::routing::{RouteMatch, RouteTable};

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub forwarder: Forwarder,
}

/// Error type for bringing an instance up.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("certificate provisioning task failed: {0}")]
    Provision(#[from] tokio::task::JoinError),
}

/// A configured instance that has not been bound yet.
pub struct InstanceServer {
    /// 1-based position in the config, used in logs.
    index: usize,
    config: InstanceConfig,
    router: Router,
}

impl InstanceServer {
    /// Build the route table and middleware chain for an instance.
    pub fn new(index: usize, config: InstanceConfig, forwarder: Forwarder) -> Self {
        let state = AppState {
            routes: Arc::new(RouteTable::from_instance(&config)),
            forwarder,
        };
        let router = Self::build_router(index, &config, state);
        Self {
            index,
            config,
            router,
        }
    }

    fn build_router(index: usize, config: &InstanceConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state);
        apply_middleware(router, index, config)
    }

    /// The fully layered router, for serving or for driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// Provision TLS material (for TLS instances) and bind the listener.
    pub async fn bind(self) -> Result<BoundInstance, InstanceError> {
        let tls = if self.config.use_ssl {
            let cert = PathBuf::from(&self.config.cert_path);
            let key = PathBuf::from(&self.config.key_path);
            // Key generation and file writes block.
            let (cert, key) = tokio::task::spawn_blocking(move || {
                ensure_certificate(&cert, &key).map(|_| (cert, key))
            })
            .await??;
            Some(load_tls_config(&cert, &key).await?)
        } else {
            None
        };

        let listener = BoundListener::bind(&self.config).await?;
        tracing::info!(
            instance = self.index,
            address = %listener.local_addr(),
            tls = tls.is_some(),
            debug = self.config.debug,
            headers = self.config.headers.len(),
            payloads = self.config.payload_host_paths.len(),
            "Starting webserver"
        );

        Ok(BoundInstance {
            index: self.index,
            router: self.router,
            listener,
            tls,
        })
    }
}

/// An instance whose listener is bound and ready to serve.
pub struct BoundInstance {
    index: usize,
    router: Router,
    listener: BoundListener,
    tls: Option<RustlsConfig>,
}

impl BoundInstance {
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Serve until `shutdown` fires, then drain for at most `grace`.
    pub async fn serve(
        self,
        mut shutdown: broadcast::Receiver<()>,
        grace: Duration,
    ) -> Result<(), std::io::Error> {
        let handle = axum_server::Handle::new();
        let watcher = handle.clone();
        let index = self.index;
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!(instance = index, "Shutdown signal received, draining");
            watcher.graceful_shutdown(Some(grace));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let listener = self.listener.into_std();

        match self.tls {
            Some(tls) => {
                axum_server::tls_rustls::from_tcp_rustls(listener, tls)
                    .handle(handle)
                    .serve(app)
                    .await?
            }
            None => axum_server::from_tcp(listener).handle(handle).serve(app).await?,
        }

        tracing::info!(instance = self.index, "HTTP server stopped");
        Ok(())
    }
}

/// Layer the request middleware chain around `router`.
pub fn apply_middleware(router: Router, index: usize, config: &InstanceConfig) -> Router {
    let router = router
        .layer(middleware::from_fn(client_ip_middleware))
        .layer(CatchPanicLayer::custom(panic_response));
    let router = with_server_headers(router, config);
    router.layer(middleware::from_fn_with_state(
        AccessLog {
            instance: index,
            enabled: config.debug,
        },
        access_log_middleware,
    ))
}

/// Main proxy handler.
/// Looks up the route and forwards the request.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match state.routes.match_request(request.method(), request.uri().path()) {
        RouteMatch::Found(entry) => {
            tracing::debug!(
                method = %request.method(),
                path = %request.uri().path(),
                route = %entry.pattern(),
                "Proxying request"
            );
            state.forwarder.forward(entry.target(), request).await
        }
        RouteMatch::MethodNotAllowed(allowed) => method_not_allowed(&allowed),
        RouteMatch::NotFound => not_found(),
    }
}
