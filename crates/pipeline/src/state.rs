//! Job lifecycle state owned by one orchestrator.
//!
//! ```text
//! Idle -> Starting -> Pending -> Processing -> Finalizing -> Succeeded
//!            |           |           |             |      \-> Failed
//!            \-----------+-----------+-------------+--cancel--> Idle
//! ```
//!
//! `Idle`, `Succeeded` and `Failed` are resting phases: a new run may start
//! from any of them. Every run gets a fresh generation token; a cancel
//! bumps it too, which turns every in-flight result of the cancelled run
//! into a no-op.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tunesmith_core::error::GenerationError;
use tunesmith_core::generation::{TaskHandle, TaskPhase};
use tunesmith_core::types::DbId;
use tunesmith_db::models::generated_music::GeneratedMusic;

use crate::status::{JobFailure, JobSnapshot};

/// Where the current (or last) run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Idle,
    Starting,
    Pending,
    Processing,
    Finalizing,
    Succeeded,
    Failed,
}

impl JobPhase {
    /// Whether a new run may start.
    pub fn is_resting(self) -> bool {
        matches!(self, Self::Idle | Self::Succeeded | Self::Failed)
    }

    pub fn is_busy(self) -> bool {
        !self.is_resting()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Finalizing => "finalizing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state behind the orchestrator's lock.
#[derive(Debug)]
pub(crate) struct JobState {
    pub generation: u64,
    pub phase: JobPhase,
    pub prompt: Option<String>,
    pub task: Option<TaskHandle>,
    pub started_at: Option<Instant>,
    pub polls: u32,
    pub music: Option<GeneratedMusic>,
    pub error: Option<GenerationError>,
    /// Last lifecycle change, for idle-session eviction.
    pub touched: Instant,
    cancel: Option<CancellationToken>,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: JobPhase::Idle,
            prompt: None,
            task: None,
            started_at: None,
            polls: 0,
            music: None,
            error: None,
            touched: Instant::now(),
            cancel: None,
        }
    }
}

impl JobState {
    /// Reset for a new run and return its generation token.
    pub fn begin(&mut self, prompt: String, cancel: CancellationToken) -> u64 {
        self.generation += 1;
        self.phase = JobPhase::Starting;
        self.prompt = Some(prompt);
        self.task = None;
        self.started_at = Some(Instant::now());
        self.polls = 0;
        self.music = None;
        self.error = None;
        self.touched = Instant::now();
        self.cancel = Some(cancel);
        self.generation
    }

    /// Resting and untouched for at least `ttl`.
    pub fn is_idle_for(&self, ttl: Duration) -> bool {
        self.phase.is_resting() && self.touched.elapsed() >= ttl
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// The vendor accepted the task.
    pub fn accept(&mut self, handle: TaskHandle) {
        self.task = Some(handle);
        self.phase = JobPhase::Pending;
    }

    /// Fold a vendor phase into the job phase. Only forward moves between
    /// `Pending` and `Processing` are applied. Returns whether the phase
    /// changed.
    pub fn advance(&mut self, remote: TaskPhase) -> bool {
        match (self.phase, remote) {
            (JobPhase::Pending, TaskPhase::Processing) => {
                self.phase = JobPhase::Processing;
                true
            }
            _ => false,
        }
    }

    pub fn finalizing(&mut self) {
        self.phase = JobPhase::Finalizing;
    }

    pub fn succeed(&mut self, music: GeneratedMusic) {
        self.phase = JobPhase::Succeeded;
        self.music = Some(music);
        self.touched = Instant::now();
        self.cancel = None;
    }

    /// Drop the reference to a library entry that no longer exists.
    /// Returns whether this state was holding it.
    pub fn forget_record(&mut self, id: DbId) -> bool {
        if self.music.as_ref().is_some_and(|m| m.id == id) {
            self.music = None;
            true
        } else {
            false
        }
    }

    pub fn fail(&mut self, error: GenerationError) {
        self.phase = JobPhase::Failed;
        self.error = Some(error);
        self.touched = Instant::now();
        self.cancel = None;
    }

    /// Abort the current run: stop its timers, invalidate its token and
    /// return to `Idle`. Returns `false` when nothing was running.
    pub fn cancel_run(&mut self) -> bool {
        if self.phase.is_resting() {
            return false;
        }
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.generation += 1;
        self.phase = JobPhase::Idle;
        self.error = Some(GenerationError::Cancelled);
        self.touched = Instant::now();
        true
    }

    pub fn snapshot(&self, session: &str) -> JobSnapshot {
        JobSnapshot {
            session: session.to_string(),
            generation: self.generation,
            phase: self.phase,
            status: wire_status(self.phase, self.task.is_some()),
            task_id: self.task.as_ref().map(|t| t.0.clone()),
            prompt: self.prompt.clone(),
            elapsed_secs: self
                .started_at
                .map(|t| t.elapsed().as_secs())
                .unwrap_or_default(),
            polls: self.polls,
            music: self.music.clone(),
            error: self.error.as_ref().map(JobFailure::from),
        }
    }
}

/// Caller-facing status vocabulary for a phase.
fn wire_status(phase: JobPhase, has_task: bool) -> Option<TaskPhase> {
    match phase {
        JobPhase::Idle if has_task => Some(TaskPhase::Failed),
        JobPhase::Idle => None,
        JobPhase::Starting | JobPhase::Pending => Some(TaskPhase::Pending),
        JobPhase::Processing | JobPhase::Finalizing => Some(TaskPhase::Processing),
        JobPhase::Succeeded => Some(TaskPhase::Success),
        JobPhase::Failed => Some(TaskPhase::Failed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> (JobState, CancellationToken, u64) {
        let mut state = JobState::default();
        let token = CancellationToken::new();
        let generation = state.begin("lo-fi beats".into(), token.clone());
        (state, token, generation)
    }

    #[test]
    fn resting_phases() {
        assert!(JobPhase::Idle.is_resting());
        assert!(JobPhase::Succeeded.is_resting());
        assert!(JobPhase::Failed.is_resting());
        for phase in [
            JobPhase::Starting,
            JobPhase::Pending,
            JobPhase::Processing,
            JobPhase::Finalizing,
        ] {
            assert!(phase.is_busy(), "{phase}");
        }
    }

    #[tokio::test]
    async fn begin_bumps_generation_and_clears_previous_run() {
        let (mut state, _, first) = started();
        state.fail(GenerationError::Timeout { attempts: 36 });

        let second = state.begin("again".into(), CancellationToken::new());

        assert_eq!(second, first + 1);
        assert_eq!(state.phase, JobPhase::Starting);
        assert!(state.error.is_none());
        assert_eq!(state.prompt.as_deref(), Some("again"));
    }

    #[tokio::test]
    async fn processing_never_regresses_to_pending() {
        let (mut state, _, _) = started();
        state.accept(TaskHandle("T1".into()));

        assert!(!state.advance(TaskPhase::Pending));
        assert!(state.advance(TaskPhase::Processing));
        assert!(!state.advance(TaskPhase::Pending));
        assert_eq!(state.phase, JobPhase::Processing);
    }

    #[tokio::test]
    async fn cancel_invalidates_generation_and_fires_token() {
        let (mut state, token, generation) = started();
        state.accept(TaskHandle("T1".into()));

        assert!(state.cancel_run());

        assert!(token.is_cancelled());
        assert!(!state.is_current(generation));
        assert_eq!(state.phase, JobPhase::Idle);
        assert!(!state.cancel_run());
    }

    #[tokio::test]
    async fn snapshot_maps_wire_status() {
        let (mut state, _, _) = started();
        assert_eq!(state.snapshot("s").status, Some(TaskPhase::Pending));

        state.accept(TaskHandle("T1".into()));
        state.advance(TaskPhase::Processing);
        state.finalizing();
        let snap = state.snapshot("s");
        assert_eq!(snap.status, Some(TaskPhase::Processing));
        assert_eq!(snap.task_id.as_deref(), Some("T1"));

        state.cancel_run();
        let snap = state.snapshot("s");
        assert_eq!(snap.status, Some(TaskPhase::Failed));
        assert_eq!(snap.error.map(|e| e.code), Some("CANCELLED"));
    }

    #[tokio::test]
    async fn forget_record_only_matches_held_id() {
        let (mut state, _, _) = started();
        state.accept(TaskHandle("T1".into()));
        state.succeed(GeneratedMusic {
            id: 7,
            prompt: "lo-fi beats".into(),
            file_url: "https://cdn.example/a.mp3".into(),
            file_path: "generated/a.mp3".into(),
            duration_seconds: 42,
            created_at: chrono::Utc::now(),
        });

        assert!(!state.forget_record(8));
        assert!(state.music.is_some());
        assert!(state.forget_record(7));
        assert!(state.snapshot("s").music.is_none());
        assert_eq!(state.phase, JobPhase::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_for_requires_rest_and_time() {
        let ttl = Duration::from_secs(600);
        let (mut state, _, _) = started();
        tokio::time::advance(ttl).await;
        assert!(!state.is_idle_for(ttl), "busy state is never idle");

        state.fail(GenerationError::Timeout { attempts: 36 });
        assert!(!state.is_idle_for(ttl));
        tokio::time::advance(ttl).await;
        assert!(state.is_idle_for(ttl));
    }

    #[test]
    fn idle_without_task_has_no_status() {
        assert_eq!(JobState::default().snapshot("s").status, None);
    }
}
