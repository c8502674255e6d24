//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_connect_attempts_total` (counter): dependency attempts by outcome
//! - `gate_lifecycle_transitions_total` (counter): transitions by from/to
//! - `gate_lifecycle_state` (gauge): current state as its numeric code
//! - `gate_in_flight_requests` (gauge): requests currently being served
//! - `gate_startup_duration_seconds` (histogram): start() until READY
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus endpoint is only started when an address is configured

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::lifecycle::LifecycleState;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connect_attempt(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("gate_connect_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_transition(from: LifecycleState, to: LifecycleState) {
    counter!(
        "gate_lifecycle_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_state(to);
}

pub fn record_state(state: LifecycleState) {
    gauge!("gate_lifecycle_state").set(state as u8 as f64);
}

pub fn record_in_flight(count: u64) {
    gauge!("gate_in_flight_requests").set(count as f64);
}

pub fn record_startup(elapsed: Duration) {
    histogram!("gate_startup_duration_seconds").record(elapsed.as_secs_f64());
}
