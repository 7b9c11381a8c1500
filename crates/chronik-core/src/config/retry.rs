use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff schedule for optimistic commit retries
///
/// The n-th retry (0-based) waits `base_delay_ms * multiplier^n`. With the
/// defaults (5ms, x2, 8 retries) the worst-case cumulative wait is 1275ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt before giving up
    /// Default: 8
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry
    /// Default: 5ms
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth factor between consecutive delays
    /// Default: 2
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

fn default_max_retries() -> u32 {
    8
}

fn default_base_delay_ms() -> u64 {
    5
}

fn default_multiplier() -> u32 {
    2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry without waiting, for tests
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 0,
            multiplier: 1,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before the given (0-based) retry
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = u64::from(self.multiplier).saturating_pow(retry);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// All delays in order, one per permitted retry
    pub fn schedule(self) -> impl Iterator<Item = Duration> {
        (0..self.max_retries).map(move |retry| self.delay_for(retry))
    }

    /// Worst-case cumulative wait before retries are exhausted
    pub fn total_wait(&self) -> Duration {
        self.schedule().sum()
    }
}
