//! Exponential backoff

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay before retry number `retry_count`.
///
/// Zero for the first attempt, `initial` for the first retry, then
/// `initial * multiplier^(n-1)` capped at `max`.
pub fn backoff(initial: Duration, max: Duration, multiplier: f64, retry_count: u32) -> Duration {
    if retry_count == 0 {
        return Duration::ZERO;
    }
    let exponent = i32::try_from(retry_count - 1).unwrap_or(i32::MAX);
    let nanos = initial.as_nanos() as f64 * multiplier.powi(exponent);
    if !nanos.is_finite() || nanos >= max.as_nanos() as f64 {
        return max;
    }
    Duration::from_nanos(nanos.round().max(0.0) as u64).min(max)
}

/// Retry configuration shared by the transport and the chunked protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            multiplier: 2.0,
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn delay_for(&self, retry_count: u32) -> Duration {
        backoff(
            self.initial_delay(),
            self.max_delay(),
            self.multiplier,
            retry_count,
        )
    }
}
