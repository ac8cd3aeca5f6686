//! Single-job generation orchestrator.
//!
//! An [`Orchestrator`] owns at most one run at a time. `start` asks the
//! vendor to create a task and spawns a poll task that checks on it at a
//! fixed cadence; once the vendor reports success the run is finalized
//! (download, store, record). Watchers follow along through
//! [`Orchestrator::subscribe`].
//!
//! Every asynchronous result is tagged with the generation token of the run
//! that issued it and discarded when the token is stale.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tunesmith_core::error::GenerationError;
use tunesmith_core::generation::{GenerationRequest, RemoteTask, TaskHandle, TaskPhase};
use tunesmith_core::polling::{poll_until, PollError};
use tunesmith_core::types::DbId;
use tunesmith_db::models::generated_music::GeneratedMusic;
use tunesmith_db::store::MediaRecordStore;
use tunesmith_events::{event_types, EventBus};
use tunesmith_storage::ArtifactStore;
use tunesmith_vendor::{ArtifactFetcher, RemoteTaskClient};

use crate::config::OrchestratorConfig;
use crate::finalize::{Finalizer, RunContext};
use crate::state::JobState;
use crate::status::{JobSnapshot, StatusReporter};

/// Everything an orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub vendor: Arc<dyn RemoteTaskClient>,
    pub fetcher: Arc<dyn ArtifactFetcher>,
    pub artifacts: Arc<ArtifactStore>,
    pub records: Arc<dyn MediaRecordStore>,
    pub events: Option<Arc<EventBus>>,
}

/// Returned by a successful [`Orchestrator::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedJob {
    pub task_id: String,
    pub generation: u64,
    /// The validated (trimmed) prompt.
    pub prompt: String,
}

pub struct Orchestrator {
    session: String,
    vendor: Arc<dyn RemoteTaskClient>,
    finalizer: Finalizer,
    config: OrchestratorConfig,
    state: Mutex<JobState>,
    reporter: StatusReporter,
    /// Parent of every run's cancellation token.
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl Orchestrator {
    /// Standalone orchestrator with its own shutdown token.
    pub fn new(
        session: impl Into<String>,
        collaborators: Collaborators,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Self::with_shutdown(
            session,
            collaborators,
            config,
            CancellationToken::new(),
            TaskTracker::new(),
        )
    }

    pub(crate) fn with_shutdown(
        session: impl Into<String>,
        collaborators: Collaborators,
        config: OrchestratorConfig,
        shutdown: CancellationToken,
        tasks: TaskTracker,
    ) -> Arc<Self> {
        let session = session.into();
        let Collaborators {
            vendor,
            fetcher,
            artifacts,
            records,
            events,
        } = collaborators;

        Arc::new(Self {
            reporter: StatusReporter::new(&session, events),
            finalizer: Finalizer::new(fetcher, artifacts, records, config.download_retry),
            session,
            vendor,
            config,
            state: Mutex::new(JobState::default()),
            shutdown,
            tasks,
        })
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Watch channel carrying the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.reporter.subscribe()
    }

    /// Fresh snapshot (elapsed time computed now).
    pub async fn snapshot(&self) -> JobSnapshot {
        self.state.lock().await.snapshot(&self.session)
    }

    /// Start a run.
    ///
    /// Fails with [`GenerationError::Busy`] while another run is active and
    /// with the vendor's classified error when task creation fails (the job
    /// then rests in `Failed`). Task creation is never retried.
    pub async fn start(self: &Arc<Self>, request: GenerationRequest) -> Result<StartedJob, GenerationError> {
        let request = request.validated()?;

        let (generation, cancel) = {
            let mut state = self.state.lock().await;
            if state.phase.is_busy() {
                tracing::info!(session = %self.session, phase = %state.phase, "Rejecting start, job in progress");
                return Err(GenerationError::Busy);
            }
            let cancel = self.shutdown.child_token();
            let generation = state.begin(request.prompt.clone(), cancel.clone());
            self.reporter.publish(state.snapshot(&self.session));
            (generation, cancel)
        };

        tracing::info!(session = %self.session, generation, "Starting music generation");
        let result = self.vendor.start(&request).await;

        let mut state = self.state.lock().await;
        if !state.is_current(generation) {
            if let Ok(handle) = &result {
                tracing::warn!(
                    session = %self.session,
                    task_id = %handle,
                    "Vendor task created for a cancelled run, abandoning it",
                );
            }
            return Err(GenerationError::Cancelled);
        }

        let handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(session = %self.session, generation, error = %e, "Vendor rejected task");
                state.fail(e.clone());
                self.reporter
                    .announce(event_types::GENERATION_FAILED, state.snapshot(&self.session));
                return Err(e);
            }
        };

        state.accept(handle.clone());
        self.reporter
            .announce(event_types::GENERATION_STARTED, state.snapshot(&self.session));
        drop(state);

        tracing::info!(session = %self.session, generation, task_id = %handle, "Generation task created");

        let this = Arc::clone(self);
        let poll_handle = handle.clone();
        self.tasks.spawn(async move {
            this.drive(generation, poll_handle, cancel).await;
        });

        Ok(StartedJob {
            task_id: handle.0,
            generation,
            prompt: request.prompt,
        })
    }

    /// Cancel the active run. Returns `false` when nothing was running.
    ///
    /// No status check is issued after this returns. The vendor task itself
    /// keeps running remotely; its result is ignored.
    pub async fn cancel(&self) -> bool {
        let mut state = self.state.lock().await;
        let previous = state.phase;
        if !state.cancel_run() {
            return false;
        }
        tracing::info!(session = %self.session, phase = %previous, "Generation cancelled");
        self.reporter
            .announce(event_types::GENERATION_CANCELLED, state.snapshot(&self.session));
        true
    }

    /// Stop handing out a library entry that was deleted. Watchers get a
    /// fresh snapshot without it. Returns whether this orchestrator held it.
    pub async fn forget_record(&self, id: DbId) -> bool {
        let mut state = self.state.lock().await;
        if !state.forget_record(id) {
            return false;
        }
        tracing::debug!(session = %self.session, record_id = id, "Dropped deleted track from job state");
        self.reporter.publish(state.snapshot(&self.session));
        true
    }

    /// Whether this orchestrator can be dropped: its last run rests, nobody
    /// watches it and nothing happened for `ttl`. A state lock held by
    /// someone else counts as activity.
    pub(crate) fn is_stale(&self, ttl: Duration) -> bool {
        if self.reporter.watchers() > 0 {
            return false;
        }
        self.state
            .try_lock()
            .is_ok_and(|state| state.is_idle_for(ttl))
    }

    // ---- private helpers ----

    /// Poll the vendor until the task settles, then finish the run.
    async fn drive(self: Arc<Self>, generation: u64, handle: TaskHandle, cancel: CancellationToken) {
        let policy = self.config.poll_policy();
        let outcome = {
            let this = &self;
            let handle = &handle;
            poll_until(
                &policy,
                &cancel,
                move |attempt| async move {
                    let task = this.vendor.status(handle).await;
                    this.observe(generation, attempt, &task).await;
                    task
                },
                |task: &RemoteTask| task.phase.is_terminal(),
            )
            .await
        };

        match outcome {
            Err(PollError::Cancelled) => {
                tracing::debug!(session = %self.session, generation, "Polling stopped");
            }
            Err(PollError::Exhausted { attempts, elapsed }) => {
                tracing::warn!(
                    session = %self.session,
                    generation,
                    task_id = %handle,
                    attempts,
                    elapsed_secs = elapsed.as_secs(),
                    "Generation timed out",
                );
                self.settle(generation, Err(GenerationError::Timeout { attempts }))
                    .await;
            }
            Ok(task) if task.phase == TaskPhase::Failed => {
                let reason = task
                    .failure_reason
                    .unwrap_or_else(|| "Music generation failed".to_string());
                tracing::warn!(session = %self.session, generation, task_id = %handle, reason = %reason, "Vendor reported failure");
                self.settle(generation, Err(GenerationError::VendorReportedFailure(reason)))
                    .await;
            }
            Ok(task) => self.finish(generation, task, &cancel).await,
        }
    }

    /// Record one status check.
    async fn observe(&self, generation: u64, attempt: u32, task: &RemoteTask) {
        let mut state = self.state.lock().await;
        if !state.is_current(generation) {
            return;
        }
        state.polls = attempt;
        tracing::debug!(
            session = %self.session,
            generation,
            attempt,
            remote_phase = ?task.phase,
            "Status check",
        );
        if state.advance(task.phase) {
            self.reporter.announce(
                event_types::GENERATION_PHASE_CHANGED,
                state.snapshot(&self.session),
            );
        } else {
            self.reporter.publish(state.snapshot(&self.session));
        }
    }

    async fn finish(&self, generation: u64, task: RemoteTask, cancel: &CancellationToken) {
        let prompt = {
            let mut state = self.state.lock().await;
            if !state.is_current(generation) {
                return;
            }
            state.finalizing();
            self.reporter.announce(
                event_types::GENERATION_PHASE_CHANGED,
                state.snapshot(&self.session),
            );
            state.prompt.clone().unwrap_or_default()
        };

        let ctx = RunContext {
            session: &self.session,
            generation,
            prompt: &prompt,
        };
        match self
            .finalizer
            .finalize(&ctx, &task, cancel, &self.reporter)
            .await
        {
            Err(GenerationError::Cancelled) => {
                tracing::debug!(session = %self.session, generation, "Finalize abandoned");
            }
            result => self.settle(generation, result).await,
        }
    }

    /// Commit the outcome of a run, unless it was superseded meanwhile, in
    /// which case a persisted result is rolled back.
    async fn settle(&self, generation: u64, result: Result<GeneratedMusic, GenerationError>) {
        let mut state = self.state.lock().await;
        if !state.is_current(generation) {
            let prompt = state.prompt.clone().unwrap_or_default();
            drop(state);
            if let Ok(record) = result {
                let ctx = RunContext {
                    session: &self.session,
                    generation,
                    prompt: &prompt,
                };
                self.finalizer.rollback(&ctx, &record, &self.reporter).await;
            }
            return;
        }

        match result {
            Ok(record) => {
                tracing::info!(session = %self.session, generation, record_id = record.id, "Generation succeeded");
                state.succeed(record);
                self.reporter
                    .announce(event_types::GENERATION_SUCCEEDED, state.snapshot(&self.session));
            }
            Err(e) => {
                tracing::warn!(session = %self.session, generation, code = e.code(), error = %e, "Generation failed");
                state.fail(e);
                self.reporter
                    .announce(event_types::GENERATION_FAILED, state.snapshot(&self.session));
            }
        }
    }
}
