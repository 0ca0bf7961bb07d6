//! Reconnect delay generator.

use std::time::Duration;

use rand::Rng;

/// Exponential reconnect backoff with jitter.
///
/// `next()` returns the current delay (plus a random jitter on top) and then
/// advances the base delay by `backoff_percent`, clamped to the configured
/// maximum. `reset()` drops the base back to the minimum; the client machine
/// calls it when a connection had been marked as established, so a link that
/// actually worked reconnects quickly.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    min_ms: u64,
    max_ms: u64,
    backoff_percent: u64,
    randomize_percent: u64,
    current_ms: u64,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self {
            min_ms: 1000,
            max_ms: 20_000,
            backoff_percent: 50,
            randomize_percent: 10,
            current_ms: 1000,
        }
    }
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum delay in milliseconds. Raises the current delay if it is now
    /// below the minimum.
    pub fn set_min_time(&mut self, ms: u64) {
        self.min_ms = ms;
        self.current_ms = self.current_ms.max(ms);
    }

    /// Maximum delay in milliseconds. Lowers the current delay if it is now
    /// above the maximum.
    pub fn set_max_time(&mut self, ms: u64) {
        self.max_ms = ms;
        self.current_ms = self.current_ms.min(ms);
    }

    /// Percent to grow the delay by on every `next()`.
    pub fn set_backoff_percent(&mut self, percent: u64) {
        self.backoff_percent = percent;
    }

    /// Percent of the delay to randomize over.
    pub fn set_randomize_percent(&mut self, percent: u64) {
        self.randomize_percent = percent;
    }

    /// Drop the delay back to the minimum.
    pub fn reset(&mut self) {
        self.current_ms = self.min_ms;
    }

    /// The next reconnect delay. Advances the base delay as a side effect.
    pub fn next(&mut self) -> Duration {
        let base = self.current_ms;
        let jitter_max = base * self.randomize_percent / 100;
        let jitter = if jitter_max == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_max)
        };
        let step = (self.current_ms * self.backoff_percent / 100).max(1);
        self.current_ms = (self.current_ms + step).min(self.max_ms);
        Duration::from_millis(base + jitter)
    }
}
