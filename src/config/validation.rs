//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port non-zero, timeouts > 0)
//! - Reject an empty dependency URI before any I/O happens
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// A single semantic problem with a `ServiceConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("port must be between 1 and 65535, got {0}")]
    PortOutOfRange(u16),

    #[error("dependency URI is empty")]
    EmptyDependencyUri,

    #[error("backoff ceiling ({ceiling_ms} ms) is below the base backoff ({base_ms} ms)")]
    BackoffCeilingBelowBase { base_ms: u64, ceiling_ms: u64 },

    #[error("connect timeout must be greater than zero")]
    ZeroConnectTimeout,

    #[error("max_connections must be greater than zero")]
    ZeroMaxConnections,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.port == 0 {
        errors.push(ValidationError::PortOutOfRange(config.port));
    }

    if config.dependency_uri.trim().is_empty() {
        errors.push(ValidationError::EmptyDependencyUri);
    }

    if config.backoff_ceiling_ms < config.retry_backoff_ms {
        errors.push(ValidationError::BackoffCeilingBelowBase {
            base_ms: config.retry_backoff_ms,
            ceiling_ms: config.backoff_ceiling_ms,
        });
    }

    if config.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }

    if config.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Render a list of validation errors on one line.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
