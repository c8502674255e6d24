//! TCP reachability connector.
//!
//! Treats a dependency as ready once a TCP connection to one of its seed
//! hosts succeeds. Works for any URI of the form
//! `scheme://[user:pass@]host[:port][,host[:port]...][/path][?query]`.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use url::Url;

use crate::dependency::{redact_uri, Connector, DependencyError, DependencyHandle};

/// Default ports for schemes the `url` crate doesn't know about.
fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "mongodb" => Some(27017),
        "postgres" | "postgresql" => Some(5432),
        "redis" | "rediss" => Some(6379),
        "amqp" => Some(5672),
        "amqps" => Some(5671),
        "mysql" => Some(3306),
        _ => None,
    }
}

/// Extract `(host, port)` pairs from a dependency URI, in the order given.
pub fn parse_seed_hosts(uri: &str) -> Result<Vec<(String, u16)>, DependencyError> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| DependencyError::InvalidUri(format!("missing scheme: {}", redact_uri(uri))))?;

    if scheme.ends_with("+srv") {
        return Err(DependencyError::InvalidUri(format!(
            "{scheme} seedlist URIs are not supported, list hosts explicitly"
        )));
    }

    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    let hosts = authority.rsplit_once('@').map_or(authority, |(_, hosts)| hosts);

    if hosts.is_empty() {
        return Err(DependencyError::InvalidUri(format!("no host in {}", redact_uri(uri))));
    }

    hosts
        .split(',')
        .map(|seed| {
            let url = Url::parse(&format!("{scheme}://{seed}"))
                .map_err(|e| DependencyError::InvalidUri(format!("{seed}: {e}")))?;

            let host = url
                .host_str()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| DependencyError::InvalidUri(format!("no host in {seed:?}")))?
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string();

            let port = url
                .port()
                .or_else(|| default_port(scheme))
                .or_else(|| url.port_or_known_default())
                .ok_or_else(|| {
                    DependencyError::InvalidUri(format!("no port given and none known for {scheme}"))
                })?;

            Ok((host, port))
        })
        .collect()
}

/// Connector that opens a plain TCP connection to the first reachable seed.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for TcpConnector {
    type Handle = TcpHandle;

    async fn connect(&self, uri: &str) -> Result<TcpHandle, DependencyError> {
        let seeds = parse_seed_hosts(uri)?;
        let mut last_error = None;

        for (host, port) in seeds {
            let target = format!("{host}:{port}");
            let attempt = tokio::time::timeout(
                self.connect_timeout,
                TcpStream::connect((host.as_str(), port)),
            )
            .await;

            match attempt {
                Ok(Ok(stream)) => {
                    let _ = stream.set_nodelay(true);
                    tracing::debug!(target = %target, "Dependency TCP connection established");
                    return Ok(TcpHandle { stream, peer: target });
                }
                Ok(Err(source)) => {
                    tracing::debug!(target = %target, error = %source, "Seed host refused connection");
                    last_error = Some(DependencyError::Io { target, source });
                }
                Err(_) => {
                    tracing::debug!(target = %target, "Seed host timed out");
                    last_error = Some(DependencyError::Timeout {
                        target,
                        timeout: self.connect_timeout,
                    });
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| DependencyError::InvalidUri(format!("no hosts in {}", redact_uri(uri)))))
    }
}

/// An open TCP connection to the dependency.
#[derive(Debug)]
pub struct TcpHandle {
    stream: TcpStream,
    peer: String,
}

impl DependencyHandle for TcpHandle {
    fn peer(&self) -> String {
        self.peer.clone()
    }

    async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(peer = %self.peer, error = %e, "Dependency socket shutdown reported an error");
        }
    }
}
