use std::sync::Arc;

use tunesmith_db::store::MediaRecordStore;
use tunesmith_events::EventBus;
use tunesmith_pipeline::OrchestratorRegistry;
use tunesmith_storage::ArtifactStore;
use tunesmith_vendor::assist::PromptAssistant;
use tunesmith_vendor::imagery::ImageGenerator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool; `None` when the record store is in memory.
    pub pool: Option<tunesmith_db::DbPool>,
    pub config: Arc<ServerConfig>,
    /// One generation orchestrator per session.
    pub registry: Arc<OrchestratorRegistry>,
    /// Library rows.
    pub records: Arc<dyn MediaRecordStore>,
    /// Stored audio files.
    pub artifacts: Arc<ArtifactStore>,
    /// Stored cover images (`thumbnails/thumbnail_...`).
    pub thumbnails: Arc<ArtifactStore>,
    /// Centralized event bus for publishing platform events.
    pub event_bus: Arc<EventBus>,
    /// Prompt assistant, when configured.
    pub assistant: Option<Arc<PromptAssistant>>,
    /// Image generation on the same gateway, when configured.
    pub images: Option<Arc<ImageGenerator>>,
}
