//! Retry policy and exponential backoff
//!
//! The delay computation is a pure function of the attempt number and a
//! jitter factor, so the envelope can be tested without sleeping.

use crate::config::Settings;
use rand::Rng;
use std::time::Duration;

/// Maximum relative jitter applied to a backoff delay (±25%)
pub const JITTER_RATIO: f64 = 0.25;

/// Computes the delay before retry number `attempt`
///
/// The nominal delay is `base * 2^(attempt - 1)`; `jitter` is clamped to
/// `[-JITTER_RATIO, JITTER_RATIO]` and scales it by `1 + jitter`.
/// Attempt 0 is treated as attempt 1.
///
/// # Example
///
/// ```
/// use feedpulse::fetch::backoff_delay;
/// use std::time::Duration;
///
/// let base = Duration::from_millis(100);
/// assert_eq!(backoff_delay(base, 3, 0.0), Duration::from_millis(400));
/// ```
pub fn backoff_delay(base: Duration, attempt: u32, jitter: f64) -> Duration {
    let exponent = attempt.max(1) - 1;
    let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
    let nominal_ms = (base.as_millis() as u64).saturating_mul(factor) as f64;

    let jitter = if jitter.is_finite() {
        jitter.clamp(-JITTER_RATIO, JITTER_RATIO)
    } else {
        0.0
    };

    Duration::from_millis((nominal_ms * (1.0 + jitter)).round() as u64)
}

/// Draws a jitter factor uniformly from `[-JITTER_RATIO, JITTER_RATIO]`
pub fn random_jitter() -> f64 {
    rand::rng().random_range(-JITTER_RATIO..=JITTER_RATIO)
}

/// How many times a source is retried and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.retry_max,
            Duration::from_millis(settings.retry_base_delay_ms),
        )
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after failed attempt number `attempt`, with random jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_delay(self.base_delay, attempt, random_jitter())
    }
}
