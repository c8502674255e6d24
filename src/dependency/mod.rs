//! Backing dependency abstraction.
//!
//! # Data Flow
//! ```text
//! LifecycleGate::start
//!     → resilience::retries (attempt loop)
//!     → Connector::connect(uri)  (one attempt)
//!     → DependencyHandle         (owned by the gate)
//!
//! LifecycleGate::shutdown / fatal startup error
//!     → DependencyHandle::close  (consumes the handle)
//! ```
//!
//! # Design Decisions
//! - `close` takes `self`, so a handle is released at most once
//! - Connectors own their per-attempt timeout
//! - Anything that can answer "is it reachable" can sit behind the gate

pub mod tcp;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use tcp::{TcpConnector, TcpHandle};

/// Why a single connection attempt failed.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("invalid dependency URI: {0}")]
    InvalidUri(String),

    #[error("connection to {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("connection to {target} failed: {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dependency rejected connection: {0}")]
    Rejected(String),
}

/// Opens connections to a backing dependency.
pub trait Connector: Send + Sync + 'static {
    type Handle: DependencyHandle;

    /// Make a single connection attempt.
    fn connect(
        &self,
        uri: &str,
    ) -> impl Future<Output = Result<Self::Handle, DependencyError>> + Send;
}

/// An open dependency connection.
pub trait DependencyHandle: Send + Sync + 'static {
    /// Human-readable description of the connected peer, for logs.
    fn peer(&self) -> String;

    /// Release the connection.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Strip userinfo from a URI so credentials never reach the logs.
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };

    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    match authority.rsplit_once('@') {
        Some((_, hosts)) => format!("{scheme}://***@{hosts}{tail}"),
        None => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_credentials() {
        assert_eq!(
            redact_uri("mongodb://admin:s3cret@db:27017/app?authSource=admin"),
            "mongodb://***@db:27017/app?authSource=admin"
        );
        assert_eq!(redact_uri("redis://cache:6379"), "redis://cache:6379");
        assert_eq!(redact_uri("not a uri"), "not a uri");
    }
}
