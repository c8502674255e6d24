//! Retry delays.
//!
//! Delay doubles per attempt from a base, gets up to 10% random jitter on
//! top, and is clamped to a ceiling after jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `attempt` (1-based). Attempt 0 waits nothing.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let Some(doublings) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };

    let factor = 1u64.checked_shl(doublings).unwrap_or(u64::MAX);
    let delay = base_ms.saturating_mul(factor).min(max_ms);

    let spread = delay / 10;
    let jitter = match spread {
        0 => 0,
        spread => rand::thread_rng().gen_range(0..spread),
    };

    Duration::from_millis(delay.saturating_add(jitter).min(max_ms))
}
