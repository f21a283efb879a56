//! Profile negotiation message types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request carrying the build parameters an operator chose for an agent.
///
/// Used by every operation except `host_file`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterMessage {
    /// Name of the profile the parameters belong to.
    #[serde(default, rename = "c2_profile_name", skip_serializing_if = "String::is_empty")]
    pub profile_name: String,
    /// Parameter values keyed by parameter name.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ParameterMessage {
    pub fn new(parameters: Map<String, Value>) -> Self {
        Self {
            profile_name: String::new(),
            parameters,
        }
    }

    pub fn string_arg(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    /// Numeric parameter, also accepting a numeric string.
    pub fn number_arg(&self, name: &str) -> Option<i64> {
        match self.parameters.get(name)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn dictionary_arg(&self, name: &str) -> Option<&Map<String, Value>> {
        self.parameters.get(name).and_then(Value::as_object)
    }
}

/// Request to serve a stored file on a public path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostFileMessage {
    /// Identifier of the file held by the backend.
    pub file_uuid: String,
    /// Public path the file is served on.
    pub host_url: String,
}

/// Outcome of a check or generation operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub success: bool,
    /// Text shown to the operator.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Problem description. May be set on a successful response as a warning.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ProfileResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: String::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: String::new(),
            error: error.into(),
        }
    }
}

/// A single indicator of compromise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ioc {
    /// Indicator kind, always `url` for this profile.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ioc")]
    pub value: String,
}

impl Ioc {
    pub fn url(value: impl Into<String>) -> Self {
        Self {
            kind: "url".into(),
            value: value.into(),
        }
    }
}

/// Indicators an agent built with the given parameters will expose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IocResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default)]
    pub iocs: Vec<Ioc>,
}

impl IocResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            iocs: Vec::new(),
        }
    }
}

/// Static description of a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDefinition {
    pub name: String,
    pub author: String,
    pub description: String,
    /// Peer-to-peer profiles link agents to each other instead of to a server.
    pub is_p2p: bool,
    /// Server-routed profiles forward every message to the backend.
    pub is_server_routed: bool,
}
