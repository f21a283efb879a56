//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve an instance's bind address (empty bind_ip means all interfaces)
//! - Bind before the serving task is spawned, so a port conflict is a
//!   startup error rather than a failure inside a background task
//! - Hand a non-blocking std listener to the HTTP layer

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::InstanceConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured address does not parse.
    #[error("invalid bind address {address}: {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: std::io::Error,
    },
}

/// A bound listener ready to be served.
#[derive(Debug)]
pub struct BoundListener {
    inner: std::net::TcpListener,
    local_addr: SocketAddr,
}

impl BoundListener {
    /// Bind to the instance's address.
    pub async fn bind(config: &InstanceConfig) -> Result<Self, ListenerError> {
        let address = config.bind_address();
        let addr: SocketAddr = address
            .parse()
            .map_err(|source| ListenerError::Address { address, source })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { address: addr, source })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind { address: addr, source })?;

        // Tokio leaves the socket in non-blocking mode, which axum-server expects.
        let inner = listener
            .into_std()
            .map_err(|source| ListenerError::Bind { address: addr, source })?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner, local_addr })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn into_std(self) -> std::net::TcpListener {
        self.inner
    }
}
