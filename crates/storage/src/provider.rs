//! Blob storage seam and the retrying artifact store.
//!
//! [`BlobStore`] mirrors the storage service's own primitives (upload,
//! public URL, delete). [`ArtifactStore`] sits on top: it picks a fresh
//! object key, uploads with bounded linear-backoff retry, and reports
//! where the artifact ended up.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tunesmith_core::retry::{retry_linear, RetryPolicy};

use crate::keys::{generate_object_key, GENERATED_PREFIX};

/// Errors from a blob storage backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// The request never got a response (network, DNS, TLS, timeout).
    #[error("Storage request failed: {0}")]
    Request(String),

    /// The storage service answered with a non-2xx status.
    #[error("Storage API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// An object is already stored under this key.
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    /// Every upload attempt failed. `file_path` is the key that was tried;
    /// an attempt whose response got lost may still have written it.
    #[error("Upload failed after {attempts} attempts: {last_error}")]
    UploadExhausted {
        attempts: u32,
        last_error: String,
        file_path: String,
    },
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Primitive operations of a blob storage service.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `path`. Must not overwrite an existing object;
    /// answers [`StorageError::AlreadyExists`] instead.
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// Public retrieval URL for `path`. Pure computation, no I/O.
    fn public_url(&self, path: &str) -> String;

    /// Remove the object at `path`. Removing a missing object succeeds.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Where a stored artifact lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    /// Storage-internal key.
    pub file_path: String,
    /// Public, stable URL.
    pub public_url: String,
}

/// Uploads artifacts under generated keys with bounded retry.
pub struct ArtifactStore {
    blobs: Arc<dyn BlobStore>,
    retry: RetryPolicy,
    prefix: String,
    stem: String,
}

impl ArtifactStore {
    /// Store using the default retry policy (3 attempts, 1 s / 2 s backoff).
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            retry: RetryPolicy::default(),
            prefix: GENERATED_PREFIX.to_string(),
            stem: "music".to_string(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Directory and file name stem for generated keys (default
    /// `generated/music_...`).
    pub fn with_stem(mut self, prefix: impl Into<String>, stem: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.stem = stem.into();
        self
    }

    /// Persist `bytes` under a fresh key, retrying failed uploads.
    ///
    /// The same key is reused across attempts so a retry can never leave
    /// two copies behind. Since the key is fresh, finding it taken on a
    /// retry means an earlier attempt landed without its response reaching
    /// us, and the upload counts as done.
    pub async fn store(&self, bytes: &[u8], content_type: &str) -> Result<StoredArtifact, StorageError> {
        let path = generate_object_key(&self.prefix, &self.stem, content_type);
        let key: &str = &path;
        let blobs: &dyn BlobStore = self.blobs.as_ref();

        retry_linear(&self.retry, "artifact upload", move |attempt| async move {
            tracing::debug!(file_path = %key, attempt, size = bytes.len(), "Uploading artifact");
            match blobs.upload(key, bytes, content_type).await {
                Err(StorageError::AlreadyExists(_)) if attempt > 1 => {
                    tracing::info!(file_path = %key, attempt, "Earlier upload attempt had landed");
                    Ok(())
                }
                result => result,
            }
        })
        .await
        .map_err(|e| StorageError::UploadExhausted {
            attempts: e.attempts,
            last_error: e.last_error.to_string(),
            file_path: path.clone(),
        })?;

        let public_url = self.blobs.public_url(&path);
        tracing::info!(file_path = %path, size = bytes.len(), "Artifact stored");

        Ok(StoredArtifact {
            file_path: path,
            public_url,
        })
    }

    /// Remove a previously stored artifact.
    pub async fn discard(&self, file_path: &str) -> Result<(), StorageError> {
        self.blobs.delete(file_path).await?;
        tracing::info!(file_path = %file_path, "Artifact removed from storage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::memory::InMemoryBlobStore;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            step: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn store_uploads_and_returns_public_url() {
        let blobs = Arc::new(InMemoryBlobStore::new("https://cdn.example/music"));
        let store = ArtifactStore::new(blobs.clone()).with_retry(fast_retry());

        let stored = store.store(b"ID3", "audio/mpeg").await.unwrap();

        assert!(stored.file_path.starts_with("generated/music_"));
        assert_eq!(
            stored.public_url,
            format!("https://cdn.example/music/{}", stored.file_path)
        );
        assert_eq!(blobs.get(&stored.file_path).await.as_deref(), Some(&b"ID3"[..]));
    }

    #[tokio::test]
    async fn two_failures_then_success_stores_once() {
        let blobs = Arc::new(InMemoryBlobStore::new("https://cdn.example/music"));
        blobs.fail_next_uploads(2);
        let store = ArtifactStore::new(blobs.clone()).with_retry(fast_retry());

        let stored = store.store(b"ID3", "audio/mpeg").await.unwrap();

        assert_eq!(blobs.upload_attempts(), 3);
        assert_eq!(blobs.paths().await, vec![stored.file_path]);
    }

    #[tokio::test]
    async fn three_failures_exhaust_retries() {
        let blobs = Arc::new(InMemoryBlobStore::new("https://cdn.example/music"));
        blobs.fail_next_uploads(3);
        let store = ArtifactStore::new(blobs.clone()).with_retry(fast_retry());

        let err = store.store(b"ID3", "audio/mpeg").await.unwrap_err();

        assert_matches!(
            err,
            StorageError::UploadExhausted { attempts: 3, ref file_path, .. }
                if file_path.starts_with("generated/music_")
        );
        assert!(blobs.paths().await.is_empty());
    }

    #[tokio::test]
    async fn retry_after_lost_response_accepts_existing_object() {
        let blobs = Arc::new(InMemoryBlobStore::new("https://cdn.example/music"));
        blobs.lose_next_responses(1);
        let store = ArtifactStore::new(blobs.clone()).with_retry(fast_retry());

        let stored = store.store(b"ID3", "audio/mpeg").await.unwrap();

        assert_eq!(blobs.upload_attempts(), 2);
        assert_eq!(blobs.paths().await, vec![stored.file_path.clone()]);
        assert_eq!(blobs.get(&stored.file_path).await.as_deref(), Some(&b"ID3"[..]));
    }

    #[tokio::test]
    async fn taken_key_on_first_attempt_is_an_error() {
        struct AlwaysTaken;

        #[async_trait]
        impl BlobStore for AlwaysTaken {
            async fn upload(&self, path: &str, _: &[u8], _: &str) -> Result<(), StorageError> {
                Err(StorageError::AlreadyExists(path.to_string()))
            }

            fn public_url(&self, path: &str) -> String {
                path.to_string()
            }

            async fn delete(&self, _: &str) -> Result<(), StorageError> {
                Ok(())
            }
        }

        let store = ArtifactStore::new(Arc::new(AlwaysTaken)).with_retry(RetryPolicy::none());

        let err = store.store(b"ID3", "audio/mpeg").await.unwrap_err();

        assert_matches!(err, StorageError::UploadExhausted { attempts: 1, .. });
    }

    #[tokio::test]
    async fn custom_stem_changes_key_layout() {
        let blobs = Arc::new(InMemoryBlobStore::new("https://cdn.example/music"));
        let store = ArtifactStore::new(blobs.clone())
            .with_retry(fast_retry())
            .with_stem("thumbnails", "thumbnail");

        let stored = store.store(b"\x89PNG", "image/png").await.unwrap();

        assert!(stored.file_path.starts_with("thumbnails/thumbnail_"), "{}", stored.file_path);
        assert!(stored.file_path.ends_with(".png"));
    }

    #[tokio::test(start_paused = true)]
    async fn default_policy_backs_off_one_then_two_seconds() {
        let blobs = Arc::new(InMemoryBlobStore::new("https://cdn.example/music"));
        blobs.fail_next_uploads(2);
        let store = ArtifactStore::new(blobs.clone());
        let start = tokio::time::Instant::now();

        store.store(b"ID3", "audio/mpeg").await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn discard_removes_object() {
        let blobs = Arc::new(InMemoryBlobStore::new("https://cdn.example/music"));
        let store = ArtifactStore::new(blobs.clone()).with_retry(fast_retry());
        let stored = store.store(b"ID3", "audio/mpeg").await.unwrap();

        store.discard(&stored.file_path).await.unwrap();

        assert!(blobs.paths().await.is_empty());
    }
}
