//! Gate status endpoint.
//!
//! The gate injects a [`GateMonitor`] extension into every request, so a
//! collaborator can mount [`status_handler`] wherever it likes.

use axum::{http::StatusCode, routing::get, Extension, Json, Router};

use crate::lifecycle::monitor::{GateMonitor, GateStatus};
use crate::lifecycle::LifecycleState;

/// `200` with the status snapshot while READY, `503` otherwise.
pub async fn status_handler(Extension(monitor): Extension<GateMonitor>) -> (StatusCode, Json<GateStatus>) {
    let status = monitor.status();
    let code = if status.state == LifecycleState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(status))
}

/// Router exposing `GET /health`.
pub fn status_routes() -> Router {
    Router::new().route("/health", get(status_handler))
}
