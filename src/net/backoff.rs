//! Exponential reconnect delay with jitter.

use rand::Rng;
use std::time::Duration;

/// Tracks consecutive reconnect attempts for one session.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms: max_ms.max(base_ms),
            attempt: 0,
        }
    }

    /// Delay before the next attempt; grows with each call.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let factor = 2u64.saturating_pow(self.attempt - 1);
        let capped = self.base_ms.saturating_mul(factor).min(self.max_ms);

        // up to 10% extra
        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }

    /// Forget previous failures after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
