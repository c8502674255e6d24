//! Request identification and admission.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the client sent one
//! - Bound concurrent requests with a semaphore (backpressure)
//! - Hold an in-flight guard for the full life of each request
//! - Abandon requests still running when the drain deadline passes
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Requests over the limit wait for a slot rather than being dropped

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{self, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Semaphore;
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::lifecycle::shutdown::ShutdownSignal;
use crate::net::RequestTracker;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Shared admission state: connection slots, in-flight tracking and the
/// drain deadline.
#[derive(Debug, Clone)]
pub struct Admission {
    slots: Arc<Semaphore>,
    tracker: RequestTracker,
    expired: ShutdownSignal,
}

impl Admission {
    pub fn new(max_connections: usize, tracker: RequestTracker, expired: ShutdownSignal) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_connections)),
            tracker,
            expired,
        }
    }
}

/// Middleware: wait for a slot, then run the request under an in-flight guard.
///
/// Once `expired` fires the handler future is dropped, its guard released,
/// and the client gets `503`.
pub async fn admit(State(admission): State<Admission>, request: Request, next: Next) -> Response {
    let mut expired = admission.expired.clone();
    let served = async {
        let Ok(_permit) = admission.slots.clone().acquire_owned().await else {
            return http::StatusCode::SERVICE_UNAVAILABLE.into_response();
        };
        let _guard = admission.tracker.track();
        next.run(request).await
    };

    tokio::select! {
        response = served => response,
        _ = expired.recv() => {
            tracing::warn!("Drain deadline passed, abandoning request");
            http::StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
