//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config.json (next to the executable, or --config)
//!     → loader.rs (create if missing, parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Config (immutable for the process lifetime)
//!     → one InstanceConfig per listener
//! ```
//!
//! # Design Decisions
//! - Config is read once; changes require a restart
//! - All fields have zero-value defaults, matching what the negotiation
//!   side writes
//! - A document that fails to decode is logged and treated as empty

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, save_config, ConfigError};
pub use schema::{BackendConfig, Config, InstanceConfig};
pub use validation::{validate_config, ValidationError};
