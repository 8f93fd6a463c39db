//! # Retry Backoff
//!
//! Exponential backoff for failed job attempts: `base * 2^n`, capped, with
//! optional jitter to avoid synchronized retries. Jitter is off by default
//! so scheduling stays deterministic.

use crate::config::BackoffSettings;
use std::time::Duration;

/// Computes the delay before a job's next attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    settings: BackoffSettings,
}

impl RetryPolicy {
    pub fn new(settings: BackoffSettings) -> Self {
        Self { settings }
    }

    /// Delay for the given retry count: `base * multiplier^retry_count`,
    /// capped at the configured maximum. Jitter, when enabled, is applied on
    /// top of the capped value.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let base = self.settings.base_ms as f64;
        let exponential = base * self.settings.multiplier.powi(retry_count.min(32) as i32);
        let mut delay_ms = exponential.min(self.settings.max_ms as f64) as u64;

        if self.settings.jitter_enabled {
            delay_ms = apply_jitter(delay_ms);
        }

        Duration::from_millis(delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(BackoffSettings::default())
    }
}

/// Randomize a delay by up to ±10%.
fn apply_jitter(delay_ms: u64) -> u64 {
    use rand::Rng;

    let jitter_range = delay_ms / 10;
    if jitter_range == 0 {
        return delay_ms;
    }
    let mut rng = rand::thread_rng();
    let jitter = rng.gen_range(0..=jitter_range);
    if rng.gen_bool(0.5) {
        delay_ms.saturating_add(jitter)
    } else {
        delay_ms.saturating_sub(jitter)
    }
}
