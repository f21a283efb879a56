//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! InstanceConfig
//!     → tls.rs (provision cert/key when use_ssl, load rustls config)
//!     → listener.rs (bind bind_ip:port)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Binding and certificate provisioning happen before any task is spawned
//! - TLS is optional per instance and handled by axum-server

pub mod listener;
pub mod tls;

pub use listener::{BoundListener, ListenerError};
pub use tls::{ensure_certificate, load_tls_config, TlsError};
