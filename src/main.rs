//! service-gate
//!
//! Starts an HTTP service only once its backing dependency is reachable.
//!
//! # Architecture Overview
//!
//! ```text
//!            ┌──────────────────────────────────────────────────────┐
//!            │                    SERVICE GATE                      │
//!            │                                                      │
//!  env/TOML ─┼─▶ config ──▶ lifecycle::gate ──▶ resilience ─────────┼──▶ Dependency
//!            │                    │               (retry/backoff)   │    (MONGO_URI)
//!            │                    ▼                                 │
//!  Client ───┼──────────────▶ net::listener ──▶ http::server ──▶ app│
//!            │                 (after READY)                        │
//!            │                                                      │
//!  SIGTERM ──┼─▶ lifecycle::signals ──▶ shutdown: stop, drain, close│
//!            └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use axum::{routing::get, Router};
use clap::Parser;

use service_gate::config::load_config;
use service_gate::error::EXIT_CONFIG;
use service_gate::http::status_routes;
use service_gate::lifecycle::signals::wait_for_shutdown_signal;
use service_gate::observability::logging::{init_logging, LogFormat};
use service_gate::observability::metrics::init_metrics;
use service_gate::{LifecycleGate, LifecycleState, TcpConnector};

#[derive(Parser)]
#[command(name = "service-gate", version)]
#[command(about = "Serve HTTP only once the backing dependency is reachable", long_about = None)]
struct Cli {
    /// Optional TOML config file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-gate starting");

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(state = %LifecycleState::Initializing, error = %e, "Configuration rejected");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    tracing::info!(
        port = config.port,
        max_retries = config.max_retries,
        retry_backoff_ms = config.retry_backoff_ms,
        drain_grace_secs = config.drain_grace_secs,
        "Configuration loaded"
    );

    if let Some(addr) = config.metrics_address {
        init_metrics(addr);
    }

    let connector = TcpConnector::new(config.connect_timeout());
    let gate = Arc::new(LifecycleGate::new(connector, app()));

    let signal_gate = Arc::clone(&gate);
    let signals = tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => signal_gate.shutdown(signal).await,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                std::future::pending().await
            }
        }
    });

    if let Err(e) = gate.start(config).await {
        tracing::error!(state = %gate.state(), error = %e, "Startup failed");
        return ExitCode::from(e.exit_code());
    }

    match signals.await {
        Ok(Ok(())) => {
            tracing::info!(state = %gate.state(), "Exiting");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            tracing::error!(state = %gate.state(), error = %e, "Shutdown finished with errors");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "Signal task failed");
            ExitCode::FAILURE
        }
    }
}

/// Application served once the gate opens.
fn app() -> Router {
    Router::new()
        .route("/", get(|| async { concat!("service-gate ", env!("CARGO_PKG_VERSION")) }))
        .merge(status_routes())
}
