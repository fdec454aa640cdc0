//! Retry delays with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::{BackoffStrategy, RetryConfig};

/// Delay to wait before the retry that follows attempt `attempt` (1-based).
pub fn retry_delay(config: &RetryConfig, attempt: u32) -> Duration {
    match config.strategy {
        BackoffStrategy::Exponential => {
            calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms)
        }
        BackoffStrategy::Linear => calculate_linear(attempt, config.base_delay_ms, config.max_delay_ms),
    }
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    with_jitter(delay_ms.min(max_ms))
}

/// Calculate linearly growing delay with jitter: `base * attempt`.
pub fn calculate_linear(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(u64::from(attempt));
    with_jitter(delay_ms.min(max_ms))
}

// Adds 0 to 10% on top of the capped delay.
fn with_jitter(capped_ms: u64) -> Duration {
    let jitter_range = capped_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_ms + jitter)
}
