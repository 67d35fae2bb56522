//! Retry policy for model loads.
//!
//! Pure delay computation; the controller owns the sleeping.

use crate::error::ErrorCategory;
use crate::hardware::Backend;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// What to do after a failed attempt.
///
/// Ordered so that any delay compares below `GiveUp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per load cycle (1 = no retry)
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Decision after attempt `attempt_number` (1-based) failed.
    ///
    /// Delay grows with the attempt number: `attempt_number * base_delay`.
    pub fn next_delay(&self, attempt_number: u32) -> RetryDecision {
        if attempt_number >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.base_delay.saturating_mul(attempt_number.max(1)))
    }

    /// Whether a failure of this category is retried at all.
    pub fn should_retry(&self, category: ErrorCategory) -> bool {
        category.is_retryable()
    }

    /// Backend for the attempt following a failure on `current`.
    ///
    /// Backend-related failures force CPU; once on CPU a cycle never goes
    /// back to GPU.
    pub fn backend_for_retry(&self, current: Backend, failure: ErrorCategory) -> Backend {
        if failure.degrades_backend() {
            Backend::Cpu
        } else {
            current
        }
    }
}
