//! HTTP server behind the gate.
//!
//! # Responsibilities
//! - Wrap the collaborator's router with gate middleware
//!   (request ID, tracing, admission, status access)
//! - Hold off accepting until the gate opens
//! - Stop accepting on shutdown and let in-flight requests finish
//!   until the drain deadline

use axum::{middleware, Extension, Router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::request::{admit, Admission, MakeRequestUuid};
use crate::lifecycle::monitor::GateMonitor;
use crate::lifecycle::shutdown::ShutdownSignal;

/// The collaborator's application wrapped for serving behind the gate.
pub struct GateServer {
    router: Router,
}

impl GateServer {
    /// Wrap `app` with the gate's middleware stack.
    ///
    /// Requests still running when `expired` fires are abandoned with `503`.
    pub fn new(
        app: Router,
        monitor: GateMonitor,
        max_connections: usize,
        expired: ShutdownSignal,
    ) -> Self {
        let admission = Admission::new(max_connections, monitor.tracker().clone(), expired);

        let router = app
            .layer(middleware::from_fn_with_state(admission, admit))
            .layer(Extension(monitor))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            );

        Self { router }
    }

    /// Serve on `listener` once `open` fires, until `stop` triggers.
    ///
    /// If `open` is dropped without firing the gate never opened and the
    /// listener is closed without accepting anything.
    pub async fn run(
        self,
        listener: TcpListener,
        open: oneshot::Receiver<()>,
        mut stop: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        if open.await.is_err() {
            tracing::debug!("Gate never opened, closing listener");
            return Ok(());
        }

        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server accepting connections");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { stop.recv().await })
            .await?;

        tracing::info!(address = %addr, "HTTP server stopped accepting");
        Ok(())
    }
}
