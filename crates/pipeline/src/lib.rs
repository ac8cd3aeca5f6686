//! Generation job orchestration.
//!
//! - [`orchestrator`]: the single-job state machine: start, poll,
//!   finalize, cancel.
//! - [`finalize`]: download, store and record a finished artifact, with
//!   compensation for partial writes.
//! - [`registry`]: one orchestrator per caller session.
//! - [`status`]: snapshots for watchers and lifecycle events.
//! - [`state`]: job phases and the generation token.
//! - `fakes`: scripted collaborators for tests, behind the `test-util`
//!   feature.

pub mod config;
#[cfg(any(test, feature = "test-util"))]
pub mod fakes;
pub mod finalize;
pub mod orchestrator;
pub mod registry;
pub mod state;
pub mod status;

pub use config::{OrchestratorConfig, DEFAULT_SESSION_TTL};
pub use orchestrator::{Collaborators, Orchestrator, StartedJob};
pub use registry::OrchestratorRegistry;
pub use state::JobPhase;
pub use status::{JobFailure, JobSnapshot};
