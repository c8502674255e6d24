//! Shared utilities for gate integration tests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use service_gate::{Connector, DependencyError, DependencyHandle, ServiceConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Counters shared between a test and the connector it hands to a gate.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    attempts: Arc<AtomicU32>,
    released: Arc<AtomicU32>,
}

#[allow(dead_code)]
impl Probe {
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u32 {
        self.released.load(Ordering::SeqCst)
    }
}

/// Connector that fails a fixed number of attempts before succeeding.
pub struct MockConnector {
    fail_first: u32,
    latency: Duration,
    probe: Probe,
}

#[allow(dead_code)]
impl MockConnector {
    /// Succeeds on attempt `n` (1-based).
    pub fn reachable_on(n: u32) -> (Self, Probe) {
        let probe = Probe::default();
        let connector = Self {
            fail_first: n.saturating_sub(1),
            latency: Duration::ZERO,
            probe: probe.clone(),
        };
        (connector, probe)
    }

    pub fn unreachable() -> (Self, Probe) {
        let (mut connector, probe) = Self::reachable_on(1);
        connector.fail_first = u32::MAX;
        (connector, probe)
    }

    /// Each attempt takes `latency` before resolving.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Connector for MockConnector {
    type Handle = MockHandle;

    async fn connect(&self, _uri: &str) -> Result<MockHandle, DependencyError> {
        let attempt = self.probe.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if attempt <= self.fail_first {
            Err(DependencyError::Rejected(format!("attempt {attempt} refused")))
        } else {
            Ok(MockHandle {
                released: self.probe.released.clone(),
            })
        }
    }
}

pub struct MockHandle {
    released: Arc<AtomicU32>,
}

impl DependencyHandle for MockHandle {
    fn peer(&self) -> String {
        "mock".to_string()
    }

    async fn close(self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Loopback config with fast retries.
pub fn test_config(port: u16) -> ServiceConfig {
    ServiceConfig {
        port,
        dependency_uri: "mock://valid".to_string(),
        max_retries: 3,
        retry_backoff_ms: 1,
        backoff_ceiling_ms: 5,
        drain_grace_secs: 5,
        bind_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ..ServiceConfig::default()
    }
}

#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Start a TCP server that stands in for a database: accepts and holds
/// connections open until the peer closes them.
#[allow(dead_code)]
pub async fn start_fake_database() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
