//! Scripted vendor and fetcher for tests and offline wiring.
//!
//! [`ScriptedVendor`] replays a fixed sequence of status results (the last
//! one repeats forever) and counts calls, so callers can assert exactly how
//! often the vendor was contacted. [`StaticFetcher`] serves one artifact
//! with optional injected failures and latency.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tunesmith_core::error::GenerationError;
use tunesmith_core::generation::{
    Artifact, GenerationRequest, RemoteTask, TaskHandle, AUDIO_CONTENT_TYPE,
};
use tunesmith_vendor::{ArtifactFetcher, RemoteTaskClient};

/// [`RemoteTaskClient`] answering from a script.
pub struct ScriptedVendor {
    task_id: String,
    start_error: Mutex<Option<GenerationError>>,
    statuses: Mutex<VecDeque<RemoteTask>>,
    requests: Mutex<Vec<GenerationRequest>>,
    start_calls: AtomicU32,
    status_calls: AtomicU32,
}

impl ScriptedVendor {
    /// Vendor that accepts every start with `task_id` and reports pending.
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            start_error: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            start_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
        }
    }

    /// Status results in order; the last one repeats.
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = RemoteTask>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            ..self
        }
    }

    /// Make the next start call fail with `err`.
    pub fn with_start_error(self, err: GenerationError) -> Self {
        Self {
            start_error: Mutex::new(Some(err)),
            ..self
        }
    }

    /// Replace the remaining status script.
    pub async fn script(&self, statuses: impl IntoIterator<Item = RemoteTask>) {
        *self.statuses.lock().await = statuses.into_iter().collect();
    }

    pub fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Requests received by `start`, in order.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl RemoteTaskClient for ScriptedVendor {
    async fn start(&self, request: &GenerationRequest) -> Result<TaskHandle, GenerationError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        if let Some(err) = self.start_error.lock().await.take() {
            return Err(err);
        }
        Ok(TaskHandle(self.task_id.clone()))
    }

    async fn status(&self, handle: &TaskHandle) -> RemoteTask {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().await;
        let next = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        next.unwrap_or_else(|| RemoteTask::pending(handle.as_str()))
    }
}

/// [`ArtifactFetcher`] serving fixed bytes.
pub struct StaticFetcher {
    bytes: Vec<u8>,
    delay: Option<Duration>,
    failing: AtomicU32,
    calls: AtomicU32,
    urls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            delay: None,
            failing: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Wait this long before answering each fetch.
    pub fn with_delay(self, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..self
        }
    }

    /// Make the next `count` fetches fail.
    pub fn fail_next(&self, count: u32) {
        self.failing.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn urls(&self) -> Vec<String> {
        self.urls.lock().await.clone()
    }
}

#[async_trait]
impl ArtifactFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Artifact, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().await.push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let injected = self
            .failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(GenerationError::DownloadFailed(
                "injected download failure".into(),
            ));
        }
        Ok(Artifact {
            bytes: self.bytes.clone(),
            content_type: AUDIO_CONTENT_TYPE.to_string(),
        })
    }
}
