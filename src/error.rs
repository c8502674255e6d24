//! Gate error types.

use thiserror::Error;

use crate::config::validation::{join_errors, ValidationError};
use crate::dependency::DependencyError;
use crate::lifecycle::state::{IllegalTransition, LifecycleState};
use crate::net::ListenerError;

/// Exit code for a failed startup.
pub const EXIT_FAILED: u8 = 1;
/// Exit code for a configuration problem found before any I/O.
pub const EXIT_CONFIG: u8 = 2;

/// Errors returned by `LifecycleGate::start`.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Rejected before any I/O. Not retryable.
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ValidationError>),

    /// Every allowed connection attempt failed.
    #[error("dependency unreachable after {attempts} attempts: {source}")]
    DependencyUnreachable {
        attempts: u32,
        #[source]
        source: DependencyError,
    },

    /// Port in use or permission denied.
    #[error("listener bind failed: {0}")]
    ListenerBindFailure(#[from] ListenerError),

    /// The gate already left INITIALIZING. Caller misuse, not fatal.
    #[error("gate already started (state {state})")]
    AlreadyStarting { state: LifecycleState },

    /// Shutdown was requested while still connecting.
    #[error("startup cancelled by shutdown after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error(transparent)]
    Transition(#[from] IllegalTransition),
}

impl StartupError {
    /// Whether this error leaves the gate unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StartupError::AlreadyStarting { .. })
    }

    /// Process exit code to report for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            StartupError::InvalidConfig(_) => EXIT_CONFIG,
            _ => EXIT_FAILED,
        }
    }
}

/// Errors returned by `LifecycleGate::shutdown`.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Nothing to shut down yet, or startup already failed.
    #[error("gate is not running (state {state})")]
    NotReady { state: LifecycleState },

    /// Another shutdown is still draining. Caller misuse, not fatal.
    #[error("shutdown already in progress")]
    AlreadyShuttingDown,

    /// The HTTP server reported an error while draining.
    #[error("HTTP server failed during drain: {0}")]
    Server(#[source] std::io::Error),

    /// The HTTP server task panicked or was cancelled unexpectedly.
    #[error("HTTP server task failed: {0}")]
    ServerTask(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_non_zero() {
        let errors = [
            StartupError::InvalidConfig(vec![ValidationError::EmptyDependencyUri]),
            StartupError::DependencyUnreachable {
                attempts: 1,
                source: DependencyError::Rejected("down".into()),
            },
            StartupError::Cancelled { attempts: 2 },
        ];

        for err in &errors {
            assert_ne!(err.exit_code(), 0, "{err}");
            assert!(err.is_fatal());
        }
        assert_eq!(errors[0].exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn already_starting_is_not_fatal() {
        let err = StartupError::AlreadyStarting { state: LifecycleState::Ready };
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "gate already started (state READY)");
    }
}
