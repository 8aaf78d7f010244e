//! Attempt-bounded retry with pluggable backoff.
//!
//! Both the classifier (exponential) and the table store (linear) drive their
//! retries through [`RetryPolicy::run`], each with its own retry predicate.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Largest doubling applied by [`Backoff::Exponential`].
const MAX_DOUBLINGS: u32 = 16;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base`, `2 * base`, `4 * base`, ...
    Exponential { base: Duration },
    /// `step`, `2 * step`, `3 * step`, ...
    Linear { step: Duration },
}

/// Maximum attempts plus the delay schedule between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Final error of a retried operation.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Error returned by the last attempt.
    pub error: E,
    /// Attempts made, including the last one.
    pub attempts: u32,
    /// True when the predicate still wanted a retry but the ceiling was hit.
    pub exhausted: bool,
}

impl RetryPolicy {
    /// A policy with at least one attempt.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::Exponential { base } => {
                base.saturating_mul(1 << (attempt - 1).min(MAX_DOUBLINGS))
            }
            Backoff::Linear { step } => step.saturating_mul(attempt),
        }
    }

    /// Run `op` until it succeeds, `should_retry` rejects its error, or the
    /// attempt ceiling is reached. `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        label: &str,
        mut op: F,
        should_retry: P,
    ) -> std::result::Result<T, RetryError<E>>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let retryable = should_retry(&error);
                    if !retryable || attempt >= self.max_attempts {
                        return Err(RetryError {
                            error,
                            attempts: attempt,
                            exhausted: retryable,
                        });
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        op = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
