//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at instance start):
//!     InstanceConfig.payloads  → one GET Exact route each
//!     generic agent routes     → GET/POST on /:val/*action, /:val, /
//!     → Freeze as immutable RouteTable
//!
//! Incoming Request (method, path)
//!     → router.rs (ordered scan)
//!     → matcher.rs (evaluate method + path pattern)
//!     → Return: ForwardTarget, MethodNotAllowed or NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - First match wins; payload routes are ordered first

pub mod matcher;
pub mod router;

pub use router::{ForwardTarget, RouteEntry, RouteMatch, RouteTable};
