//! Record store seam.
//!
//! [`MediaRecordStore`] is what the orchestrator and HTTP handlers use to
//! write and read the library. [`PgMediaRecordStore`] is the production
//! implementation on top of [`GeneratedMusicRepo`].

use async_trait::async_trait;
use tunesmith_core::types::DbId;

use crate::models::generated_music::{CreateGeneratedMusic, GeneratedMusic};
use crate::repositories::GeneratedMusicRepo;
use crate::DbPool;

/// Errors from a record store backend.
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

/// Structured metadata about finished generations.
///
/// The store is the single source of truth for what exists in the library.
#[async_trait]
pub trait MediaRecordStore: Send + Sync {
    /// Insert a row and return it with its assigned id and timestamp.
    async fn insert(&self, record: CreateGeneratedMusic) -> Result<GeneratedMusic, RecordStoreError>;

    /// Newest-first listing, at most `limit` rows.
    async fn list(&self, limit: i64) -> Result<Vec<GeneratedMusic>, RecordStoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<GeneratedMusic>, RecordStoreError>;

    /// Remove a row. Deleting an id that does not exist succeeds.
    /// Returns whether a row was actually removed.
    async fn delete_by_id(&self, id: DbId) -> Result<bool, RecordStoreError>;
}

/// PostgreSQL-backed record store.
#[derive(Clone)]
pub struct PgMediaRecordStore {
    pool: DbPool,
}

impl PgMediaRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaRecordStore for PgMediaRecordStore {
    async fn insert(&self, record: CreateGeneratedMusic) -> Result<GeneratedMusic, RecordStoreError> {
        let row = GeneratedMusicRepo::create(&self.pool, &record).await?;
        tracing::debug!(record_id = row.id, file_path = %row.file_path, "Inserted generated_music row");
        Ok(row)
    }

    async fn list(&self, limit: i64) -> Result<Vec<GeneratedMusic>, RecordStoreError> {
        Ok(GeneratedMusicRepo::list_recent(&self.pool, limit).await?)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<GeneratedMusic>, RecordStoreError> {
        Ok(GeneratedMusicRepo::find_by_id(&self.pool, id).await?)
    }

    async fn delete_by_id(&self, id: DbId) -> Result<bool, RecordStoreError> {
        Ok(GeneratedMusicRepo::delete(&self.pool, id).await?)
    }
}
