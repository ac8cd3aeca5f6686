//! Orchestrator tuning knobs.

use std::time::Duration;

use tunesmith_core::generation::{DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use tunesmith_core::polling::PollPolicy;
use tunesmith_core::retry::RetryPolicy;

/// How long a resting, unwatched session is kept before eviction.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Polling cadence and retry behaviour for every job an orchestrator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Delay between two vendor status checks (first check one interval
    /// after the vendor accepted the task).
    pub poll_interval: Duration,
    /// Status checks before the job fails with a timeout.
    pub max_poll_attempts: u32,
    /// Retry policy for downloading the finished artifact.
    pub download_retry: RetryPolicy,
    /// Idle time after which a session's orchestrator may be evicted.
    pub session_ttl: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            download_retry: RetryPolicy::default(),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

impl OrchestratorConfig {
    pub fn new(poll_interval: Duration, max_poll_attempts: u32) -> Self {
        Self {
            poll_interval,
            max_poll_attempts,
            ..Self::default()
        }
    }

    pub fn with_download_retry(mut self, retry: RetryPolicy) -> Self {
        self.download_retry = retry;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Poll policy: attempt ceiling plus a wall-clock deadline one interval
    /// past the nominal polling window.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::with_attempts(self.poll_interval, self.max_poll_attempts)
    }
}
