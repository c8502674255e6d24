//! Configuration schema definitions.
//!
//! `ServiceConfig` is built once at process start (file, then environment)
//! and handed to the gate by value. Nothing mutates it afterwards.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port used when `PORT` is absent or unusable.
pub const DEFAULT_PORT: u16 = 5000;

/// Root configuration for a gated service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// TCP port the listener binds to (1-65535).
    pub port: u16,

    /// Connection URI of the backing dependency (e.g. `mongodb://db:27017/app`).
    pub dependency_uri: String,

    /// Retries after the first failed connection attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub retry_backoff_ms: u64,

    /// Upper bound on any single backoff delay in milliseconds.
    pub backoff_ceiling_ms: u64,

    /// Deadline for a single connection attempt in milliseconds.
    pub connect_timeout_ms: u64,

    /// How long in-flight requests may run once shutdown starts.
    pub drain_grace_secs: u64,

    /// Interface to bind on.
    pub bind_host: IpAddr,

    /// Maximum concurrent requests served (backpressure).
    pub max_connections: usize,

    /// Prometheus scrape endpoint. Disabled when unset.
    pub metrics_address: Option<SocketAddr>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            dependency_uri: String::new(),
            max_retries: 5,
            retry_backoff_ms: 500,
            backoff_ceiling_ms: 30_000,
            connect_timeout_ms: 5_000,
            drain_grace_secs: 10,
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_connections: 10_000,
            metrics_address: None,
        }
    }
}

impl ServiceConfig {
    /// Defaults with the two required values filled in.
    pub fn new(port: u16, dependency_uri: impl Into<String>) -> Self {
        Self {
            port,
            dependency_uri: dependency_uri.into(),
            ..Self::default()
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.backoff_ceiling_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_secs)
    }

    /// Address the listener binds to.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.port)
    }
}
