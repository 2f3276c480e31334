//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject duplicate or unnamed backends
//! - Check header names and dot-paths are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use http::HeaderName;
use thiserror::Error;

use crate::config::schema::{BackendConfig, GatewayConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend #{0} has an empty name")]
    EmptyBackendName(usize),

    #[error("backend `{0}` is defined more than once")]
    DuplicateBackend(String),

    #[error("backend `{backend}`: `{header}` is not a valid header name")]
    InvalidHeaderName { backend: String, header: String },

    #[error("backend `{backend}`: mapping has an empty key or value")]
    EmptyMappingKey { backend: String },

    #[error("backend `{backend}`: `{path}` is not a valid dot-path")]
    InvalidDotPath { backend: String, path: String },
}

/// Validate a whole gateway configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (i, backend) in config.backends.iter().enumerate() {
        if backend.name.trim().is_empty() {
            errors.push(ValidationError::EmptyBackendName(i));
        } else if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        validate_backend(backend, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_backend(backend: &BackendConfig, errors: &mut Vec<ValidationError>) {
    for header in &backend.response_headers {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName {
                backend: backend.name.clone(),
                header: header.clone(),
            });
        }
    }

    if backend
        .mapping
        .iter()
        .any(|(from, to)| from.is_empty() || to.is_empty())
    {
        errors.push(ValidationError::EmptyMappingKey {
            backend: backend.name.clone(),
        });
    }

    let paths = backend
        .target
        .iter()
        .chain(backend.allow.iter())
        .chain(backend.deny.iter());
    for path in paths {
        if !is_valid_dot_path(path) {
            errors.push(ValidationError::InvalidDotPath {
                backend: backend.name.clone(),
                path: path.clone(),
            });
        }
    }
}

fn is_valid_dot_path(path: &str) -> bool {
    !path.is_empty() && path.split('.').all(|segment| !segment.is_empty())
}
