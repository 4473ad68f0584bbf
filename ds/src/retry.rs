//! Retry policy for failed deliveries.
//!
//! Failures are retried in place with exponential back-off. The default
//! policy never gives up, so ordering and eventual delivery hold; a finite
//! `max_attempts` turns an exhausted message into a
//! [`DeliveryEvent::Abandoned`](crate::service::DeliveryEvent) and lets the
//! queue move on.

use std::time::Duration;

/// Delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(250);

/// Upper bound for the retry delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Total transmissions allowed per message; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Resend right away, forever.
    pub fn immediate() -> Self {
        Self {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay before the next transmission after `failed_attempts` failures,
    /// or `None` when the message should be given up.
    pub fn backoff(&self, failed_attempts: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if failed_attempts >= max {
                return None;
            }
        }
        let exp = failed_attempts.saturating_sub(1).min(31);
        let delay = self.initial_backoff.saturating_mul(1u32 << exp);
        Some(delay.min(self.max_backoff))
    }
}
