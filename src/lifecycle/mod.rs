//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → per instance: route table → TLS material → bind → spawn
//!
//! Running:
//!     Supervisor waits on signals.rs or a failing listener task
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → each listener drains → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: instances come up in config order
//! - Any startup or listener failure is fatal to the process
//! - Shutdown has a drain deadline per listener

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{StartupError, Supervisor};
