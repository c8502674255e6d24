//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind to the configured host and port
//! - Report bind failures (port in use, permission denied) with the address
//!
//! Concurrency limits are enforced per request by the HTTP layer.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Bind a TCP listener, returning it with its resolved local address.
pub async fn bind(addr: SocketAddr) -> Result<(TcpListener, SocketAddr), ListenerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| ListenerError::Bind { addr, source })?;

    tracing::info!(address = %local_addr, "Listener bound");

    Ok((listener, local_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let (_listener, local) = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn port_in_use_is_reported() {
        let (_held, local) = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let err = bind(local).await.unwrap_err();
        assert!(matches!(
            err,
            ListenerError::Bind { ref source, .. } if source.kind() == std::io::ErrorKind::AddrInUse
        ));
        assert!(err.to_string().contains(&local.to_string()));
    }
}
