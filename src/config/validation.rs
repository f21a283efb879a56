//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject instances that could never serve: TLS without key material,
//!   payload routes that are not absolute paths, headers that cannot be
//!   put on the wire
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: Config → Result<(), Vec<ValidationError>>

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::{Config, InstanceConfig};

/// A single semantic problem, tagged with the 1-based instance it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("instance {instance}: use_ssl requires both cert_path and key_path")]
    MissingTlsPaths { instance: usize },
    #[error("instance {instance}: payload path {path:?} must start with '/'")]
    RelativePayloadPath { instance: usize, path: String },
    #[error("instance {instance}: payload {path:?} has invalid file identifier {file_id:?}")]
    InvalidFileId {
        instance: usize,
        path: String,
        file_id: String,
    },
    #[error("instance {instance}: invalid response header {name:?}")]
    InvalidHeader { instance: usize, name: String },
}

/// Validate every instance, collecting all problems.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let errors: Vec<ValidationError> = config
        .instances
        .iter()
        .enumerate()
        .flat_map(|(position, instance)| validate_instance(position + 1, instance))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_instance(instance: usize, config: &InstanceConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.use_ssl && (config.cert_path.is_empty() || config.key_path.is_empty()) {
        errors.push(ValidationError::MissingTlsPaths { instance });
    }

    for (path, file_id) in &config.payload_host_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativePayloadPath {
                instance,
                path: path.clone(),
            });
        }
        if !is_valid_file_id(file_id) {
            errors.push(ValidationError::InvalidFileId {
                instance,
                path: path.clone(),
                file_id: file_id.clone(),
            });
        }
    }

    for (name, value) in &config.headers {
        let ok = HeaderName::from_bytes(name.as_bytes()).is_ok()
            && HeaderValue::from_str(value).is_ok();
        if !ok {
            errors.push(ValidationError::InvalidHeader {
                instance,
                name: name.clone(),
            });
        }
    }

    errors
}

/// File identifiers become a single backend path segment.
fn is_valid_file_id(file_id: &str) -> bool {
    !file_id.is_empty()
        && !file_id
            .chars()
            .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
}
