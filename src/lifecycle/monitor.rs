//! Read-only view of a gate, shared with request handlers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::sync::watch;

use crate::lifecycle::state::{LifecycleState, StateCell};
use crate::net::RequestTracker;

/// Point-in-time snapshot of a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateStatus {
    pub state: LifecycleState,
    /// Dependency connection attempts made so far.
    pub attempts: u32,
    /// Address the listener is bound to, once bound.
    pub local_addr: Option<SocketAddr>,
    pub in_flight: u64,
    /// Why shutdown was requested, once it has been.
    pub shutdown_reason: Option<String>,
}

/// Cloneable handle onto a gate's observable state.
#[derive(Debug, Clone)]
pub struct GateMonitor {
    inner: Arc<MonitorInner>,
}

#[derive(Debug, Default)]
pub(crate) struct MonitorInner {
    pub(crate) state: StateCell,
    pub(crate) attempts: AtomicU32,
    pub(crate) local_addr: OnceLock<SocketAddr>,
    pub(crate) shutdown_reason: OnceLock<String>,
    pub(crate) tracker: RequestTracker,
}

impl GateMonitor {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(MonitorInner::default()),
        }
    }

    pub(crate) fn inner(&self) -> &MonitorInner {
        &self.inner
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.get()
    }

    /// States entered so far, oldest first.
    pub fn history(&self) -> Vec<LifecycleState> {
        self.inner.state.history()
    }

    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr.get().copied()
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.inner.tracker
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.inner.state.subscribe()
    }

    pub fn status(&self) -> GateStatus {
        GateStatus {
            state: self.state(),
            attempts: self.attempts(),
            local_addr: self.local_addr(),
            in_flight: self.inner.tracker.active_count(),
            shutdown_reason: self.inner.shutdown_reason.get().cloned(),
        }
    }
}
