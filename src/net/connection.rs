//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently being served
//! - Let shutdown report and wait on outstanding work while draining

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::observability::metrics;

/// Tracks in-flight requests for graceful drain.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    active: AtomicU64,
    idle: Notify,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new in-flight request. Returns a guard that decrements on drop.
    pub fn track(&self) -> RequestGuard {
        let active = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_in_flight(active);
        RequestGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Get current in-flight request count.
    pub fn active_count(&self) -> u64 {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Wait until no requests are in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard that tracks a request's lifetime.
/// Decrements the in-flight count when dropped.
#[derive(Debug)]
pub struct RequestGuard {
    inner: Arc<TrackerInner>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let remaining = self.inner.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_in_flight(remaining);
        if remaining == 0 {
            self.inner.idle.notify_waiters();
        }
    }
}
