// src/exec/retry.rs

//! Retry decisions and exponential backoff.

use std::time::Duration;

use crate::errors::ProcessError;

/// Hard ceiling on retries, whatever the caller or config asks for.
pub const ABSOLUTE_MAX_RETRIES: u32 = 10;

/// Pure retry decision function.
///
/// `attempt` is always the zero-based count of *prior* failed attempts, i.e.
/// the index of the attempt that just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: ABSOLUTE_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// `max_retries` is clamped to [`ABSOLUTE_MAX_RETRIES`]; a `max_delay`
    /// below `base_delay` is raised to it.
    pub fn new(base_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            max_retries: max_retries.min(ABSOLUTE_MAX_RETRIES),
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// The retry limit actually honoured for a caller asking for `requested`.
    pub fn effective_limit(&self, requested: u32) -> u32 {
        requested.min(self.max_retries)
    }

    pub fn should_retry(&self, attempt: u32, max_retries: u32, error: &ProcessError) -> bool {
        error.is_retryable() && attempt < self.effective_limit(max_retries)
    }

    /// `min(base * 2^attempt, max_delay)`, saturating.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
