//! In-memory [`BlobStore`] for tests and local wiring.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::provider::{BlobStore, StorageError};

pub struct InMemoryBlobStore {
    base_url: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    upload_attempts: AtomicU32,
    failing_uploads: AtomicU32,
    lost_responses: AtomicU32,
    failing_deletes: AtomicU32,
}

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

impl InMemoryBlobStore {
    /// `base_url` is prepended to object paths to form public URLs.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            upload_attempts: AtomicU32::new(0),
            failing_uploads: AtomicU32::new(0),
            lost_responses: AtomicU32::new(0),
            failing_deletes: AtomicU32::new(0),
        }
    }

    /// Make the next `count` uploads fail.
    pub fn fail_next_uploads(&self, count: u32) {
        self.failing_uploads.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` successful uploads store the object but
    /// report a timeout, as when the response is lost in transit.
    pub fn lose_next_responses(&self, count: u32) {
        self.lost_responses.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` deletes fail.
    pub fn fail_next_deletes(&self, count: u32) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }

    /// Total upload calls, successful or not.
    pub fn upload_attempts(&self) -> u32 {
        self.upload_attempts.load(Ordering::SeqCst)
    }

    /// Sorted paths of every stored object.
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(path).map(|o| o.bytes.clone())
    }

    pub async fn content_type(&self, path: &str) -> Option<String> {
        self.objects.lock().await.get(path).map(|o| o.content_type.clone())
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failing_uploads) {
            return Err(StorageError::Api {
                status: 503,
                body: "injected upload failure".into(),
            });
        }

        let mut objects = self.objects.lock().await;
        if objects.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        if take_one(&self.lost_responses) {
            return Err(StorageError::Request("operation timed out".into()));
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        if take_one(&self.failing_deletes) {
            return Err(StorageError::Api {
                status: 503,
                body: "injected delete failure".into(),
            });
        }
        self.objects.lock().await.remove(path);
        Ok(())
    }
}
