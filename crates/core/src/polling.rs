//! Poll-until-terminal loop with an attempt ceiling and a deadline.
//!
//! [`poll_until`] sleeps for the configured interval, runs the check, and
//! stops as soon as the check result satisfies the terminal predicate.
//! Waiting is a timer inside `tokio::select!` against a
//! [`CancellationToken`], so a cancelled poller never issues another check.
//! Checks are strictly sequential: the next interval starts only after the
//! previous check resolved.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cadence and ceiling for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before each check (including the first).
    pub interval: Duration,
    /// Maximum number of checks.
    pub max_attempts: u32,
    /// Wall-clock limit measured from the start of the loop.
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    /// Policy bounded by attempts, with a deadline of one spare interval
    /// beyond `interval * max_attempts` so slow checks cannot stretch it.
    pub fn with_attempts(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            deadline: Some(interval.saturating_mul(max_attempts.saturating_add(1))),
        }
    }
}

/// Why a polling loop stopped without reaching a terminal result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// Attempt ceiling or deadline reached.
    #[error("polling gave up after {attempts} attempts ({elapsed:?})")]
    Exhausted { attempts: u32, elapsed: Duration },

    /// The cancellation token fired.
    #[error("polling cancelled")]
    Cancelled,
}

/// Run `check` every `policy.interval` until `is_terminal` accepts its
/// result, the ceiling is reached, or `cancel` fires.
///
/// `check` receives the 1-based attempt number.
pub async fn poll_until<T, F, Fut, P>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut check: F,
    is_terminal: P,
) -> Result<T, PollError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
    P: Fn(&T) -> bool,
{
    let started = Instant::now();
    let deadline = policy.deadline.map(|d| started + d);
    let mut attempts = 0u32;

    while attempts < policy.max_attempts {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(policy.interval) => {}
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        attempts += 1;
        let fut = check(attempts);
        let value = match deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                result = tokio::time::timeout_at(deadline, fut) => match result {
                    Ok(value) => value,
                    Err(_) => break,
                },
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                value = fut => value,
            },
        };

        if is_terminal(&value) {
            return Ok(value);
        }

        tracing::trace!(attempt = attempts, "Poll result not terminal");
    }

    Err(PollError::Exhausted {
        attempts,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(5),
            max_attempts,
            deadline: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_terminal_value() {
        let cancel = CancellationToken::new();
        let result = poll_until(&policy(10), &cancel, |n| async move { n }, |n| *n == 3).await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_waits_one_interval() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let _ = poll_until(&policy(1), &cancel, |_| async {}, |_| true).await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = poll_until(
            &policy(36),
            &cancel,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            },
            |_| false,
        )
        .await;

        assert_matches!(result, Err(PollError::Exhausted { attempts: 36, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 36);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_slow_checks() {
        let cancel = CancellationToken::new();
        let policy = PollPolicy {
            interval: Duration::from_secs(1),
            max_attempts: 100,
            deadline: Some(Duration::from_secs(10)),
        };

        let result = poll_until(
            &policy,
            &cancel,
            |_| tokio::time::sleep(Duration::from_secs(3)),
            |_| false,
        )
        .await;

        // 1s wait + 3s check per attempt: two complete, the third is cut off.
        assert_matches!(result, Err(PollError::Exhausted { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_before_next_check() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = poll_until(
            &policy(5),
            &cancel,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            },
            |_| false,
        )
        .await;

        assert_eq!(result, Err(PollError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_check_wins() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let result = poll_until(
            &policy(5),
            &cancel,
            move |_| {
                let trigger = trigger.clone();
                async move {
                    trigger.cancel();
                    std::future::pending::<()>().await
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Err(PollError::Cancelled));
    }

    #[test]
    fn with_attempts_adds_one_spare_interval() {
        let p = PollPolicy::with_attempts(Duration::from_secs(5), 36);
        assert_eq!(p.deadline, Some(Duration::from_secs(185)));
    }
}
