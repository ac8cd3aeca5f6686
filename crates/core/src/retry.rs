//! Bounded retry with linear backoff.
//!
//! The first attempt runs immediately; attempt `n` waits
//! `step * (n - 1)` first, so the default policy waits 1 s and then 2 s.

use std::future::Future;
use std::time::Duration;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            step: Duration::ZERO,
        }
    }

    /// Delay to wait before the 1-based `attempt`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt.saturating_sub(1))
    }
}

/// The operation failed on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or `policy.max_attempts` is used up.
///
/// `label` names the operation in log output.
pub async fn retry_linear<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = label, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= max_attempts => {
                tracing::error!(
                    operation = label,
                    attempts = attempt,
                    error = %e,
                    "Giving up",
                );
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                attempt += 1;
                let delay = policy.delay_before(attempt);
                tracing::warn!(
                    operation = label,
                    next_attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying",
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
