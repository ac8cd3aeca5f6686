//! Per-session orchestrators.
//!
//! [`OrchestratorRegistry`] hands out one [`Orchestrator`] per session key,
//! created when the session first starts a run. All orchestrators share the
//! same collaborators, a master cancellation token and a task tracker, so
//! [`shutdown`](OrchestratorRegistry::shutdown) stops every poll task.
//! Sessions that sit idle are dropped by
//! [`evict_idle`](OrchestratorRegistry::evict_idle).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tunesmith_core::types::DbId;

use crate::config::OrchestratorConfig;
use crate::orchestrator::{Collaborators, Orchestrator};

/// Session used when the caller does not identify itself.
pub const DEFAULT_SESSION: &str = "anonymous";

/// Longest accepted session key.
pub const MAX_SESSION_LEN: usize = 128;

pub struct OrchestratorRegistry {
    orchestrators: RwLock<HashMap<String, Arc<Orchestrator>>>,
    collaborators: Collaborators,
    config: OrchestratorConfig,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl OrchestratorRegistry {
    pub fn new(collaborators: Collaborators, config: OrchestratorConfig) -> Self {
        Self {
            orchestrators: RwLock::new(HashMap::new()),
            collaborators,
            config,
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Normalise a caller-supplied session key.
    ///
    /// Blank keys map to [`DEFAULT_SESSION`]; keys are trimmed and capped at
    /// [`MAX_SESSION_LEN`] characters.
    pub fn session_key(raw: Option<&str>) -> String {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(key) => key.chars().take(MAX_SESSION_LEN).collect(),
            None => DEFAULT_SESSION.to_string(),
        }
    }

    /// Orchestrator for `session`, if one was created already.
    pub async fn get(&self, session: &str) -> Option<Arc<Orchestrator>> {
        self.orchestrators.read().await.get(session).cloned()
    }

    /// Orchestrator for `session`, created on first use.
    pub async fn get_or_create(&self, session: &str) -> Arc<Orchestrator> {
        if let Some(existing) = self.get(session).await {
            return existing;
        }

        let mut orchestrators = self.orchestrators.write().await;
        orchestrators
            .entry(session.to_string())
            .or_insert_with(|| {
                tracing::debug!(session, "Creating orchestrator");
                Orchestrator::with_shutdown(
                    session,
                    self.collaborators.clone(),
                    self.config,
                    self.cancel.child_token(),
                    self.tasks.clone(),
                )
            })
            .clone()
    }

    /// Drop a deleted library entry from every session still showing it.
    /// Returns how many sessions were holding it.
    pub async fn forget_record(&self, id: DbId) -> usize {
        let orchestrators: Vec<_> = self.orchestrators.read().await.values().cloned().collect();
        let mut forgotten = 0;
        for orchestrator in orchestrators {
            if orchestrator.forget_record(id).await {
                forgotten += 1;
            }
        }
        forgotten
    }

    /// Drop every session whose last run rests, that has no watchers and
    /// no outside handles, and that has been untouched for `ttl`. Returns
    /// how many were dropped.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut orchestrators = self.orchestrators.write().await;
        let before = orchestrators.len();
        orchestrators.retain(|session, orchestrator| {
            let stale = Arc::strong_count(orchestrator) == 1 && orchestrator.is_stale(ttl);
            if stale {
                tracing::debug!(session = %session, "Evicting idle session");
            }
            !stale
        });
        before - orchestrators.len()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.orchestrators.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orchestrators.read().await.is_empty()
    }

    /// Cancel every run and wait up to `grace` for poll tasks to exit.
    pub async fn shutdown(&self, grace: Duration) {
        tracing::info!("Shutting down generation orchestrators");

        for (session, orchestrator) in self.orchestrators.read().await.iter() {
            if orchestrator.cancel().await {
                tracing::info!(session = %session, "Cancelled in-flight generation");
            }
        }
        self.cancel.cancel();
        self.tasks.close();

        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            tracing::warn!(
                remaining = self.tasks.len(),
                "Poll tasks still running after shutdown grace period",
            );
        }

        tracing::info!("Orchestrator shutdown complete");
    }
}
