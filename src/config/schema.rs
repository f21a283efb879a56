//! Configuration schema definitions.
//!
//! The on-disk document keeps the key names the profile container has always
//! used (`use_ssl`, `ServerHeaders`, `payloads`, ...), so a config written by
//! the negotiation side is read here unchanged.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Root configuration: one entry per listening instance.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Instances in startup order.
    pub instances: Vec<InstanceConfig>,
}

/// A single listening instance.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct InstanceConfig {
    /// TCP port to listen on.
    pub port: u16,

    /// Path to the private key (PEM), used when `use_ssl` is set.
    pub key_path: String,

    /// Path to the certificate (PEM), used when `use_ssl` is set.
    pub cert_path: String,

    /// Emit an access log line for every request.
    pub debug: bool,

    /// Terminate TLS on this instance.
    pub use_ssl: bool,

    /// Headers set on every response.
    #[serde(rename = "ServerHeaders")]
    pub headers: BTreeMap<String, String>,

    /// Public URL path -> hosted file identifier.
    #[serde(rename = "payloads")]
    pub payload_host_paths: BTreeMap<String, String>,

    /// Bind address; empty means all interfaces.
    pub bind_ip: String,
}

impl InstanceConfig {
    /// Plaintext instance on the given port with everything else zeroed.
    pub fn plain(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// The `host:port` string this instance binds to.
    pub fn bind_address(&self) -> String {
        let ip = if self.bind_ip.is_empty() {
            Ipv4Addr::UNSPECIFIED.to_string()
        } else {
            self.bind_ip.clone()
        };
        if ip.contains(':') && !ip.starts_with('[') {
            format!("[{}]:{}", ip, self.port)
        } else {
            format!("{}:{}", ip, self.port)
        }
    }
}

/// Address of the Mythic server that receives forwarded traffic.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BackendConfig {
    /// `http` or `https`.
    pub scheme: String,

    /// Hostname or IP of the server.
    pub host: String,

    /// Server port.
    pub port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "127.0.0.1".to_string(),
            port: 17443,
        }
    }
}

impl BackendConfig {
    /// `host:port` authority for outbound requests.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
