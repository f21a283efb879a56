//! Mythic HTTP C2 profile listener library

pub mod config;
pub mod http;
pub mod net;
pub mod routing;
pub mod lifecycle;
pub mod observability;
pub mod profile;

pub use config::schema::{BackendConfig, Config, InstanceConfig};
pub use http::InstanceServer;
pub use lifecycle::{Shutdown, Supervisor};
pub use profile::{C2Profile, HttpProfile};
