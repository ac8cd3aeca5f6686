//! In-memory [`MediaRecordStore`] for tests and local wiring.
//!
//! Supports injecting insert failures so callers can exercise the
//! record-failure path without a database.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tunesmith_core::types::DbId;

use crate::models::generated_music::{CreateGeneratedMusic, GeneratedMusic};
use crate::store::{MediaRecordStore, RecordStoreError};

#[derive(Default)]
pub struct InMemoryMediaRecordStore {
    rows: Mutex<Vec<GeneratedMusic>>,
    next_id: Mutex<DbId>,
    failing_inserts: AtomicU32,
}

impl InMemoryMediaRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` inserts fail.
    pub fn fail_next_inserts(&self, count: u32) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Number of rows currently stored.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Copy of every stored row, oldest first.
    pub async fn rows(&self) -> Vec<GeneratedMusic> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl MediaRecordStore for InMemoryMediaRecordStore {
    async fn insert(&self, record: CreateGeneratedMusic) -> Result<GeneratedMusic, RecordStoreError> {
        let injected = self
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RecordStoreError::Unavailable("injected insert failure".into()));
        }

        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        let row = GeneratedMusic {
            id: *next_id,
            prompt: record.prompt,
            file_url: record.file_url,
            file_path: record.file_path,
            duration_seconds: record.duration_seconds,
            created_at: chrono::Utc::now(),
        };
        self.rows.lock().await.push(row.clone());
        Ok(row)
    }

    async fn list(&self, limit: i64) -> Result<Vec<GeneratedMusic>, RecordStoreError> {
        let rows = self.rows.lock().await;
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        // Insertion order is creation order; ids break timestamp ties.
        let mut newest_first: Vec<_> = rows.iter().cloned().collect();
        newest_first.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        newest_first.truncate(take);
        Ok(newest_first)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<GeneratedMusic>, RecordStoreError> {
        Ok(self.rows.lock().await.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_by_id(&self, id: DbId) -> Result<bool, RecordStoreError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }
}
