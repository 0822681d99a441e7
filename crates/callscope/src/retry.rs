//! Bounded retry with exponential backoff.
//!
//! Every pipeline unit and the authentication pre-step are wrapped in
//! the same policy shape: up to `max_attempts` tries, sleeping
//! `base_delay * 2^attempt_index` between them. Fatal errors (missing
//! configuration and the like) skip the remaining budget.

use std::time::Duration;

/// Errors that can opt out of retrying.
pub trait Retryable {
    /// Fatal errors are returned immediately instead of consuming
    /// the retry budget.
    fn is_fatal(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff base; the sleep before attempt `n+1` is `base * 2^n`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Returns the delay to sleep after the attempt with the given
    /// zero-based index fails.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        // Cap the shift so a runaway attempt counter saturates instead
        // of overflowing.
        let factor = 1u32.checked_shl(attempt_index).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Runs `op` until it succeeds, returns a fatal error, or the
    /// attempt budget is exhausted. The closure receives the zero-based
    /// attempt index.
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 0u32;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if attempt + 1 >= self.max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    log::warn!(
                        "Attempt {}/{} failed, retrying in {:?}: {}",
                        attempt + 1,
                        self.max_attempts,
                        delay,
                        e
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
