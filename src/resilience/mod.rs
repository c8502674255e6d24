//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Startup connecting to the dependency:
//!     → retries.rs (attempt, observe failure, decide whether to retry)
//!     → backoff.rs (exponential delay, jitter, ceiling)
//!     → cancellation from the gate's shutdown path at any point
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Jittered backoff prevents thundering herd on a recovering database
//! - Retry count is bounded by configuration, never infinite

pub mod backoff;
pub mod retries;

pub use retries::{connect_with_retry, Connected, RetryError, RetryPolicy};
