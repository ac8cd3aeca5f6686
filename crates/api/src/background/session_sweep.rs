//! Periodic eviction of idle generation sessions.
//!
//! A session's orchestrator stays in the registry after its run rests so
//! the client can still read the result. Once nobody has touched it for
//! the configured TTL, and no status stream is open, it is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tunesmith_pipeline::OrchestratorRegistry;

/// Upper bound on the time between sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(registry: Arc<OrchestratorRegistry>, ttl: Duration, cancel: CancellationToken) {
    let period = ttl.min(MAX_SWEEP_INTERVAL);
    tracing::info!(
        ttl_secs = ttl.as_secs(),
        interval_secs = period.as_secs(),
        "Session sweep started"
    );

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweep stopping");
                break;
            }
            _ = interval.tick() => {
                let evicted = registry.evict_idle(ttl).await;
                if evicted > 0 {
                    let remaining = registry.len().await;
                    tracing::info!(evicted, remaining, "Session sweep: evicted idle sessions");
                } else {
                    tracing::debug!("Session sweep: nothing to evict");
                }
            }
        }
    }
}
