//! Bounded retry with exponential backoff.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::errors::TransientApiError;

/// How often and how patiently a network call is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any backoff delay.
    pub max_backoff: Duration,
    /// Longest wait accepted for a rate-limit reset; longer waits give up.
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_rate_limit_wait: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` and no delays.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            max_rate_limit_wait: Duration::ZERO,
        }
    }

    /// Backoff before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails permanently or attempts run out.
    pub fn run<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, TransientApiError>,
    ) -> Result<T, TransientApiError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_attempts {
                return Err(TransientApiError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            let delay = match &err {
                TransientApiError::RateLimited { reset_in } => {
                    if *reset_in > self.max_rate_limit_wait {
                        return Err(err);
                    }
                    *reset_in
                }
                _ => self.backoff(attempt),
            };
            warn!(what, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
            thread::sleep(delay);
            attempt += 1;
        }
    }
}
