//! Backoff calculations.
//!
//! - Recovery backoff for the circuit breaker: deterministic, multiplicative, capped
//! - Retry backoff for re-attempting a timed-out remote call: exponential with jitter

use rand::Rng;
use std::time::Duration;

/// Next recovery timeout after a failed half-open trial.
///
/// Grows by `multiplier` and never exceeds `max`. Always strictly greater than
/// `current` while `current < max`.
pub fn next_recovery_timeout(current: Duration, multiplier: f64, max: Duration) -> Duration {
    if current >= max || !multiplier.is_finite() {
        return max;
    }
    // an overflowing product lands on the cap
    let grown = match Duration::try_from_secs_f64(current.as_secs_f64() * multiplier.max(1.0)) {
        Ok(grown) => grown,
        Err(_) => return max,
    };
    // float rounding can map a tiny duration back to itself
    let grown = if grown <= current {
        current + Duration::from_millis(1)
    } else {
        grown
    };
    grown.min(max)
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
