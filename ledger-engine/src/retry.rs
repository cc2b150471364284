//! Retry policy for transactional conflicts
//!
//! Optimistic commits lose races under contention; the losing side re-runs
//! the same transaction body after a short backoff. Delays grow
//! exponentially with a random jitter so colliding writers spread out.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff policy for conflict retries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt before surfacing contention
    pub max_retries: u32,
    /// Delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay (milliseconds)
    pub max_delay_ms: u64,
    /// Exponential growth factor per attempt
    pub backoff_multiplier: f64,
    /// Fraction of the base delay added as random jitter
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 10,
            max_delay_ms: 250,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Delay to sleep before the given retry attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        let jitter = rand::thread_rng().gen_range(0.0..=self.jitter_factor) * base;
        let delay_ms = (base + jitter).min(self.max_delay_ms as f64);
        Duration::from_millis(delay_ms as u64)
    }
}
