//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → middleware/access_log.rs (one record per request)
//!     → response.rs (panic containment, configured server headers)
//!     → request.rs (X-Forwarded-For)
//!     → [route table picks a forward target]
//!     → forward.rs (rewrite and send to the Mythic backend)
//!     → Send to client
//! ```

pub mod forward;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use server::{AppState, BoundInstance, InstanceError, InstanceServer};
