//! Status reporting for watchers.
//!
//! The latest [`JobSnapshot`] is held in a `tokio::sync::watch` channel so
//! any number of watchers (status endpoint, SSE stream, tests) can read or
//! await it. Lifecycle milestones are additionally published on the
//! [`EventBus`].

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tunesmith_core::error::GenerationError;
use tunesmith_core::generation::TaskPhase;
use tunesmith_db::models::generated_music::GeneratedMusic;
use tunesmith_events::{EventBus, PlatformEvent};

use crate::state::JobPhase;

/// Point-in-time view of an orchestrator's current (or last) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub session: String,
    pub generation: u64,
    pub phase: JobPhase,
    /// `PENDING` / `PROCESSING` / `SUCCESS` / `FAILED`; absent before the
    /// first run.
    pub status: Option<TaskPhase>,
    pub task_id: Option<String>,
    pub prompt: Option<String>,
    pub elapsed_secs: u64,
    pub polls: u32,
    pub music: Option<GeneratedMusic>,
    pub error: Option<JobFailure>,
}

impl JobSnapshot {
    pub fn idle(session: &str) -> Self {
        Self {
            session: session.to_string(),
            generation: 0,
            phase: JobPhase::Idle,
            status: None,
            task_id: None,
            prompt: None,
            elapsed_secs: 0,
            polls: 0,
            music: None,
            error: None,
        }
    }
}

/// Caller-facing description of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
    pub generated_remotely: bool,
}

impl From<&GenerationError> for JobFailure {
    fn from(err: &GenerationError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            retryable: err.retryable(),
            generated_remotely: err.generated_remotely(),
        }
    }
}

/// Fan-out of snapshots and lifecycle events for one orchestrator.
pub struct StatusReporter {
    tx: watch::Sender<JobSnapshot>,
    events: Option<Arc<EventBus>>,
}

impl StatusReporter {
    pub fn new(session: &str, events: Option<Arc<EventBus>>) -> Self {
        let (tx, _) = watch::channel(JobSnapshot::idle(session));
        Self { tx, events }
    }

    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.tx.subscribe()
    }

    /// Number of live watch receivers.
    pub fn watchers(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Last published snapshot.
    pub fn latest(&self) -> JobSnapshot {
        self.tx.borrow().clone()
    }

    /// Replace the snapshot watchers see.
    pub fn publish(&self, snapshot: JobSnapshot) {
        self.tx.send_replace(snapshot);
    }

    /// Publish the snapshot and a lifecycle event carrying it.
    pub fn announce(&self, event_type: &str, snapshot: JobSnapshot) {
        if let Some(bus) = &self.events {
            let mut event = PlatformEvent::new(event_type)
                .with_session(snapshot.session.clone())
                .with_generation(snapshot.generation)
                .with_payload(serde_json::to_value(&snapshot).unwrap_or_default());
            if let Some(music) = &snapshot.music {
                event = event.with_record(music.id);
            }
            bus.publish(event);
        }
        self.publish(snapshot);
    }

    /// Publish a free-standing event (not tied to a snapshot change).
    pub fn emit(&self, event: PlatformEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}
