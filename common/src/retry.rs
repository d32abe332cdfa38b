// Retry strategy for transport-level failures
// Governs only connection errors and timeouts; HTTP status codes are
// validated one layer above the executor and are never retried here.

use rand::Rng;
use std::time::Duration;

/// Maximum number of retries after the initial attempt (5 attempts total)
pub const MAX_RETRIES: u32 = 4;

/// Retry strategy trait for calculating retry delays
pub trait RetryStrategy: Send + Sync {
    /// Calculate the delay before the next retry attempt
    /// Returns None if max retries exceeded
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Check if more retries are allowed
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < MAX_RETRIES
    }

    /// Get the maximum number of retries
    fn max_retries(&self) -> u32 {
        MAX_RETRIES
    }
}

/// Exponential backoff retry strategy with jitter
/// Sequence: 1s, 2s, 4s, 8s, ... capped at the configured maximum sleep.
/// The cap is the caller-facing knob (`max_retry_sleep`); tests shrink it
/// to keep retry scenarios fast.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Base delay in milliseconds (default: 1000)
    base_delay_ms: u64,
    /// Maximum sleep between attempts in milliseconds (default: 120000)
    max_sleep_ms: u64,
    /// Jitter factor (0.0 to 1.0, default: 0.1 = 10%)
    jitter_factor: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_sleep_ms: 120_000, // 2 minutes
            jitter_factor: 0.1,
        }
    }
}

impl ExponentialBackoff {
    /// Create an exponential backoff strategy with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an exponential backoff strategy capped at `max_sleep`
    pub fn with_max_sleep(max_sleep: Duration) -> Self {
        Self {
            max_sleep_ms: max_sleep.as_millis() as u64,
            ..Self::default()
        }
    }

    /// Create an exponential backoff strategy with custom values
    pub fn with_config(base_delay_ms: u64, max_sleep_ms: u64, jitter_factor: f64) -> Self {
        Self {
            base_delay_ms,
            max_sleep_ms,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
        }
    }

    /// Calculate exponential delay without jitter
    fn calculate_base_delay_ms(&self, attempt: u32) -> u64 {
        let delay = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        delay.min(self.max_sleep_ms)
    }

    /// Add random jitter to prevent thundering herd
    fn add_jitter_ms(&self, base_delay_ms: u64) -> u64 {
        if self.jitter_factor == 0.0 {
            return base_delay_ms;
        }

        let jitter_range_ms = (base_delay_ms as f64 * self.jitter_factor) as u64;
        let jitter_ms = if jitter_range_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_range_ms)
        } else {
            0
        };

        base_delay_ms + jitter_ms
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= MAX_RETRIES {
            return None;
        }

        let base_delay_ms = self.calculate_base_delay_ms(attempt);
        Some(Duration::from_millis(self.add_jitter_ms(base_delay_ms)))
    }
}

/// Fixed delay retry strategy (for testing or simple cases)
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= MAX_RETRIES {
            return None;
        }
        Some(self.delay)
    }
}
