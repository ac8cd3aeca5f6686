//! Turning a finished vendor task into a library entry.
//!
//! Steps: download the artifact (retried), store it durably (retried by
//! [`ArtifactStore`]), insert the metadata row. The cancellation token is
//! checked between steps; whatever a cancelled run already wrote is
//! removed again. A failed insert deletes the uploaded blob so storage
//! never holds media the library does not know about. The same goes for
//! an upload that ran out of retries, since an attempt whose response was
//! lost may still have written the object. If that delete fails too, the
//! blob is reported as orphaned.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tunesmith_core::error::GenerationError;
use tunesmith_core::generation::{record_duration_secs, Artifact, RemoteTask};
use tunesmith_core::retry::{retry_linear, RetryPolicy};
use tunesmith_db::models::generated_music::{CreateGeneratedMusic, GeneratedMusic};
use tunesmith_db::store::MediaRecordStore;
use tunesmith_events::{event_types, PlatformEvent};
use tunesmith_storage::{ArtifactStore, StorageError};
use tunesmith_vendor::ArtifactFetcher;

use crate::status::StatusReporter;

/// Identifies the run being finalized, for logs and events.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub session: &'a str,
    pub generation: u64,
    /// The caller's original prompt, recorded verbatim.
    pub prompt: &'a str,
}

/// Download, store, record.
pub struct Finalizer {
    fetcher: Arc<dyn ArtifactFetcher>,
    artifacts: Arc<ArtifactStore>,
    records: Arc<dyn MediaRecordStore>,
    download_retry: RetryPolicy,
}

impl Finalizer {
    pub fn new(
        fetcher: Arc<dyn ArtifactFetcher>,
        artifacts: Arc<ArtifactStore>,
        records: Arc<dyn MediaRecordStore>,
        download_retry: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            artifacts,
            records,
            download_retry,
        }
    }

    /// Persist the result of a successful vendor task.
    ///
    /// Returns [`GenerationError::Cancelled`] when `cancel` fired at any
    /// point; in that case nothing written by this call survives.
    pub async fn finalize(
        &self,
        ctx: &RunContext<'_>,
        task: &RemoteTask,
        cancel: &CancellationToken,
        reporter: &StatusReporter,
    ) -> Result<GeneratedMusic, GenerationError> {
        let url = task
            .result_url
            .as_deref()
            .ok_or_else(|| GenerationError::VendorReportedFailure("No audio URL in response".into()))?;

        // 1. Download. Safe to abandon midway: nothing is written yet.
        let artifact = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            result = self.download(url) => result?,
        };

        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        // 2. Store. Not raced against cancel so the key is always known.
        let stored = match self
            .artifacts
            .store(&artifact.bytes, &artifact.content_type)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                if let StorageError::UploadExhausted { file_path, .. } = &e {
                    self.discard(ctx, file_path, reporter).await;
                }
                return Err(GenerationError::PersistFailed(e.to_string()));
            }
        };

        if cancel.is_cancelled() {
            self.discard(ctx, &stored.file_path, reporter).await;
            return Err(GenerationError::Cancelled);
        }

        // 3. Record.
        let create = CreateGeneratedMusic {
            prompt: ctx.prompt.to_string(),
            file_url: stored.public_url.clone(),
            file_path: stored.file_path.clone(),
            duration_seconds: record_duration_secs(task.duration_secs),
        };

        let record = match self.records.insert(create).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(
                    session = ctx.session,
                    generation = ctx.generation,
                    file_path = %stored.file_path,
                    error = %e,
                    "Failed to save music record, removing uploaded file",
                );
                self.discard(ctx, &stored.file_path, reporter).await;
                return Err(GenerationError::RecordFailed(e.to_string()));
            }
        };

        if cancel.is_cancelled() {
            self.rollback(ctx, &record, reporter).await;
            return Err(GenerationError::Cancelled);
        }

        tracing::info!(
            session = ctx.session,
            generation = ctx.generation,
            record_id = record.id,
            file_path = %record.file_path,
            duration_seconds = record.duration_seconds,
            "Music saved to library",
        );

        Ok(record)
    }

    /// Remove a record written for a run that turned out to be stale,
    /// together with its blob.
    pub async fn rollback(&self, ctx: &RunContext<'_>, record: &GeneratedMusic, reporter: &StatusReporter) {
        tracing::info!(
            session = ctx.session,
            generation = ctx.generation,
            record_id = record.id,
            "Rolling back result of cancelled run",
        );
        if let Err(e) = self.records.delete_by_id(record.id).await {
            tracing::error!(record_id = record.id, error = %e, "Failed to delete record of cancelled run");
        }
        self.discard(ctx, &record.file_path, reporter).await;
    }

    async fn download(&self, url: &str) -> Result<Artifact, GenerationError> {
        let fetcher = self.fetcher.as_ref();
        retry_linear(&self.download_retry, "artifact download", move |attempt| async move {
            tracing::debug!(attempt, "Downloading generated audio");
            fetcher.fetch(url).await
        })
        .await
        .map_err(|e| e.last_error)
    }

    /// Compensating blob delete. A failure leaves an orphan, which is
    /// logged and announced for out-of-band cleanup.
    async fn discard(&self, ctx: &RunContext<'_>, file_path: &str, reporter: &StatusReporter) {
        if let Err(e) = self.artifacts.discard(file_path).await {
            tracing::error!(
                session = ctx.session,
                generation = ctx.generation,
                file_path = %file_path,
                error = %e,
                "Orphaned artifact left in storage",
            );
            reporter.emit(
                PlatformEvent::new(event_types::ARTIFACT_ORPHANED)
                    .with_session(ctx.session)
                    .with_generation(ctx.generation)
                    .with_payload(json!({
                        "file_path": file_path,
                        "error": e.to_string(),
                    })),
            );
        }
    }
}
