//! Profile negotiation subsystem.
//!
//! # Data Flow
//! ```text
//! Operator request (operation name + JSON message)
//!     → dispatch (parse operation, decode message)
//!     → C2Profile implementation (http_profile.rs)
//!         - reads/writes the listener config file where needed
//!     → JSON response
//! ```
//!
//! # Design Decisions
//! - Operations never fail at the transport level; problems are reported in
//!   the response body (`success: false`, `error`)
//! - Only unknown operations and undecodable messages are `ProfileError`s

pub mod http_profile;
pub mod messages;
pub mod parameters;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use http_profile::HttpProfile;
pub use messages::{
    HostFileMessage, Ioc, IocResponse, ParameterMessage, ProfileDefinition, ProfileResponse,
};
pub use parameters::{ParameterType, ProfileParameter};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unknown profile operation: {0}")]
    UnknownOperation(String),

    #[error("malformed {operation} message: {source}")]
    Message {
        operation: Operation,
        source: serde_json::Error,
    },

    #[error("failed to encode {operation} response: {source}")]
    Encode {
        operation: Operation,
        source: serde_json::Error,
    },
}

/// Capabilities a C2 profile exposes to the Mythic server.
pub trait C2Profile: Send + Sync {
    fn definition(&self) -> ProfileDefinition;

    /// Build parameters agents are configured with.
    fn parameters(&self) -> Vec<ProfileParameter>;

    /// Compare agent callback settings with the deployed listeners.
    fn config_check(&self, message: &ParameterMessage) -> ProfileResponse;

    /// Generate redirector configuration for the agent settings.
    fn redirector_rules(&self, message: &ParameterMessage) -> ProfileResponse;

    fn opsec_check(&self, message: &ParameterMessage) -> ProfileResponse;

    fn get_ioc(&self, message: &ParameterMessage) -> IocResponse;

    /// Example traffic an agent with these settings would produce.
    fn sample_message(&self, message: &ParameterMessage) -> ProfileResponse;

    /// Start serving a stored file on a public path.
    fn host_file(&self, message: &HostFileMessage) -> ProfileResponse;
}

/// Operations reachable through [`dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ConfigCheck,
    RedirectorRules,
    OpsecCheck,
    GetIoc,
    SampleMessage,
    HostFile,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::ConfigCheck,
        Operation::RedirectorRules,
        Operation::OpsecCheck,
        Operation::GetIoc,
        Operation::SampleMessage,
        Operation::HostFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ConfigCheck => "config_check",
            Operation::RedirectorRules => "redirector_rules",
            Operation::OpsecCheck => "opsec_check",
            Operation::GetIoc => "get_ioc",
            Operation::SampleMessage => "sample_message",
            Operation::HostFile => "host_file",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ProfileError::UnknownOperation(s.to_string()))
    }
}

fn decode<T: serde::de::DeserializeOwned>(operation: Operation, message: &str) -> Result<T, ProfileError> {
    serde_json::from_str(message).map_err(|source| ProfileError::Message { operation, source })
}

fn encode<T: Serialize>(operation: Operation, response: &T) -> Result<Value, ProfileError> {
    serde_json::to_value(response).map_err(|source| ProfileError::Encode { operation, source })
}

/// Run a named operation against a profile.
pub fn dispatch(profile: &dyn C2Profile, operation: &str, message: &str) -> Result<Value, ProfileError> {
    let op: Operation = operation.parse()?;
    tracing::debug!(operation = %op, "Dispatching profile operation");

    match op {
        Operation::ConfigCheck => encode(op, &profile.config_check(&decode(op, message)?)),
        Operation::RedirectorRules => encode(op, &profile.redirector_rules(&decode(op, message)?)),
        Operation::OpsecCheck => encode(op, &profile.opsec_check(&decode(op, message)?)),
        Operation::GetIoc => encode(op, &profile.get_ioc(&decode(op, message)?)),
        Operation::SampleMessage => encode(op, &profile.sample_message(&decode(op, message)?)),
        Operation::HostFile => encode(op, &profile.host_file(&decode(op, message)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn unknown_operation_is_an_error() {
        let profile = HttpProfile::new("unused.json");
        let err = dispatch(&profile, "rotate_keys", "{}").unwrap_err();
        assert!(matches!(err, ProfileError::UnknownOperation(name) if name == "rotate_keys"));
    }

    #[test]
    fn malformed_message_is_an_error() {
        let profile = HttpProfile::new("unused.json");
        let err = dispatch(&profile, "host_file", r#"{"file_uuid": "x"}"#).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::Message {
                operation: Operation::HostFile,
                ..
            }
        ));
    }

    #[test]
    fn dispatch_returns_operation_response() {
        let profile = HttpProfile::new("unused.json");
        let message = r#"{"parameters": {"callback_host": "https://domain.com", "callback_port": 443}}"#;

        let response = dispatch(&profile, "opsec_check", message).unwrap();
        assert_eq!(response["success"], false);
        assert!(response["error"].as_str().unwrap().contains("default"));
    }

    #[test]
    fn definition_describes_server_routed_http() {
        let definition = HttpProfile::new("unused.json").definition();
        assert_eq!(definition.name, "http");
        assert!(definition.is_server_routed);
        assert!(!definition.is_p2p);
    }
}
