//! Dependency connection retries.
//!
//! # Responsibilities
//! - Make at most `max_retries + 1` connection attempts
//! - Sleep an exponential, jittered, capped backoff between attempts
//! - Abort immediately when the cancellation signal fires
//!
//! # Design Decisions
//! - Every attempt and every sleep races the cancellation signal
//! - No sleep after the final attempt
//! - The caller observes each failed attempt before its backoff starts

use std::time::Duration;

use thiserror::Error;

use crate::config::ServiceConfig;
use crate::dependency::{Connector, DependencyError};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Retry limits for connecting to a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_backoff(),
            max_delay: config.backoff_ceiling(),
        }
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.base_delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
        )
    }
}

/// Successful connection plus the number of attempts it took.
#[derive(Debug)]
pub struct Connected<H> {
    pub handle: H,
    pub attempts: u32,
}

/// Why the retry loop stopped without a connection.
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: DependencyError,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts } => *attempts,
        }
    }
}

/// Connect to `uri`, retrying per `policy` until success, exhaustion or
/// cancellation. `on_retry` runs after each failed attempt that will be
/// followed by another one.
pub async fn connect_with_retry<C, F>(
    connector: &C,
    uri: &str,
    policy: RetryPolicy,
    cancel: &mut ShutdownSignal,
    mut on_retry: F,
) -> Result<Connected<C::Handle>, RetryError>
where
    C: Connector,
    F: FnMut(u32, &DependencyError),
{
    let max_attempts = policy.max_attempts();
    let mut attempts = 0;

    loop {
        if cancel.is_triggered() {
            return Err(RetryError::Cancelled { attempts });
        }

        attempts += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.recv() => return Err(RetryError::Cancelled { attempts }),
            result = connector.connect(uri) => result,
        };

        let error = match outcome {
            Ok(handle) => {
                metrics::record_connect_attempt(true);
                return Ok(Connected { handle, attempts });
            }
            Err(e) => {
                metrics::record_connect_attempt(false);
                e
            }
        };

        if attempts >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts,
                last_error: error,
            });
        }

        on_retry(attempts, &error);

        let delay = policy.delay_after(attempts);
        tracing::warn!(
            attempt = attempts,
            max_attempts,
            delay = ?delay,
            error = %error,
            "Dependency connection failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.recv() => return Err(RetryError::Cancelled { attempts }),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
