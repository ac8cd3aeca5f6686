//! Supabase Storage REST client implementing [`BlobStore`].
//!
//! Object endpoints live under `{url}/storage/v1/object/{bucket}/{path}`;
//! public objects are served from
//! `{url}/storage/v1/object/public/{bucket}/{path}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::provider::{BlobStore, StorageError};

/// Connection settings for the storage service.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Service-role key used for uploads and deletes.
    pub service_key: String,
    /// Bucket holding generated media (default `music`).
    pub bucket: String,
    pub request_timeout: Duration,
}

/// HTTP client for one storage bucket.
pub struct HttpBlobStore {
    client: reqwest::Client,
    config: StorageConfig,
}

impl HttpBlobStore {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling).
    pub fn with_client(client: reqwest::Client, mut config: StorageConfig) -> Self {
        config.url = config.url.trim_end_matches('/').to_string();
        Self { client, config }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url,
            self.config.bucket,
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
    }

    /// Turn a non-2xx response into [`StorageError::Api`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StorageError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Whether an upload was refused because the key is taken. The service
/// reports this either as a plain 409 or as a 400 whose body carries
/// `"statusCode":"409"` / `"Duplicate"`.
fn is_duplicate(status: u16, body: &str) -> bool {
    status == StatusCode::CONFLICT.as_u16()
        || (status == StatusCode::BAD_REQUEST.as_u16()
            && (body.contains("\"409\"") || body.contains("Duplicate")))
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        let response = self
            .authorized(self.client.post(self.object_url(path)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .send()
            .await?;

        match Self::ensure_success(response).await {
            Ok(_) => Ok(()),
            Err(StorageError::Api { status, body }) if is_duplicate(status, &body) => {
                Err(StorageError::AlreadyExists(path.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url,
            self.config.bucket,
            path.trim_start_matches('/')
        )
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let response = self
            .authorized(self.client.delete(self.object_url(path)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(file_path = %path, "Object already absent");
            return Ok(());
        }

        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> HttpBlobStore {
        HttpBlobStore::with_client(
            reqwest::Client::new(),
            StorageConfig {
                url: url.to_string(),
                service_key: "secret".into(),
                bucket: "music".into(),
                request_timeout: Duration::from_secs(5),
            },
        )
    }

    #[test]
    fn public_url_uses_public_prefix() {
        let s = store("https://proj.supabase.co/");
        assert_eq!(
            s.public_url("generated/a.mp3"),
            "https://proj.supabase.co/storage/v1/object/public/music/generated/a.mp3"
        );
    }

    #[test]
    fn duplicate_detection() {
        assert!(is_duplicate(409, ""));
        assert!(is_duplicate(
            400,
            r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#
        ));
        assert!(!is_duplicate(400, r#"{"error":"Invalid key"}"#));
        assert!(!is_duplicate(503, "Duplicate"));
    }

    #[test]
    fn object_url_strips_leading_slash() {
        let s = store("https://proj.supabase.co");
        assert_eq!(
            s.object_url("/generated/a.mp3"),
            "https://proj.supabase.co/storage/v1/object/music/generated/a.mp3"
        );
    }
}
