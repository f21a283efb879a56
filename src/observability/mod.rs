//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → access records under the `access_log` target
//!
//! Consumers:
//!     → logging.rs (fmt subscriber on stdout, filtered by level)
//! ```
//!
//! # Design Decisions
//! - One subscriber for the whole process, installed by the binary
//! - `RUST_LOG` overrides the configured level when set

pub mod logging;

pub use logging::{default_directives, init_tracing, normalize_level};
