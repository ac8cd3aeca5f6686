#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use tunesmith_api::config::ServerConfig;
use tunesmith_api::router::build_app_router;
use tunesmith_api::state::AppState;
use tunesmith_db::memory::InMemoryMediaRecordStore;
use tunesmith_events::EventBus;
use tunesmith_pipeline::fakes::{ScriptedVendor, StaticFetcher};
use tunesmith_pipeline::{Collaborators, JobSnapshot, OrchestratorRegistry};
use tunesmith_storage::memory::InMemoryBlobStore;
use tunesmith_storage::keys::THUMBNAIL_PREFIX;
use tunesmith_storage::ArtifactStore;
use tunesmith_vendor::assist::PromptAssistant;
use tunesmith_vendor::imagery::ImageGenerator;

pub const STORAGE_BASE: &str = "https://project.supabase.co/storage/v1/object/public/music";

/// Build a test `ServerConfig` through the same parser production uses.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and the default polling cadence (5 s, 36 attempts).
pub fn test_config() -> ServerConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("HOST", "127.0.0.1"),
        ("PORT", "0"),
        ("DATABASE_URL", "postgres://unused"),
        ("VENDOR_API_KEY", "test-vendor-key"),
        ("STORAGE_URL", "https://project.supabase.co"),
        ("STORAGE_SERVICE_KEY", "test-service-key"),
    ]);
    ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
        .expect("test configuration is valid")
}

/// Fully wired application backed by in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub vendor: Arc<ScriptedVendor>,
    pub fetcher: Arc<StaticFetcher>,
    pub records: Arc<InMemoryMediaRecordStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub thumbnails: Arc<ArtifactStore>,
    pub registry: Arc<OrchestratorRegistry>,
    pub event_bus: Arc<EventBus>,
}

impl TestApp {
    /// Router sharing this app's state.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Wait (on the paused clock) until the session's run rests.
    pub async fn settled(&self, session: &str) -> JobSnapshot {
        let orchestrator = self
            .registry
            .get(session)
            .await
            .expect("session has an orchestrator");
        let mut rx = orchestrator.subscribe();
        let snapshot = tokio::time::timeout(
            Duration::from_secs(3600),
            rx.wait_for(|s| s.phase.is_resting()),
        )
        .await
        .expect("job should settle")
        .expect("orchestrator alive")
        .clone();
        snapshot
    }
}

/// Build the full application router with all middleware layers.
///
/// Uses the same [`build_app_router`] as `main.rs`, so integration tests
/// exercise the production middleware stack (CORS, request ID, timeout,
/// tracing, panic recovery).
pub fn build_test_app(vendor: ScriptedVendor) -> TestApp {
    build_test_app_with_assistant(vendor, None)
}

pub fn build_test_app_with_assistant(
    vendor: ScriptedVendor,
    assistant: Option<PromptAssistant>,
) -> TestApp {
    build_test_app_with(vendor, assistant, None)
}

pub fn build_test_app_with_images(images: ImageGenerator) -> TestApp {
    build_test_app_with(ScriptedVendor::new("T1"), None, Some(images))
}

fn build_test_app_with(
    vendor: ScriptedVendor,
    assistant: Option<PromptAssistant>,
    images: Option<ImageGenerator>,
) -> TestApp {
    let config = test_config();
    let vendor = Arc::new(vendor);
    let fetcher = Arc::new(StaticFetcher::new(b"ID3 fake mp3 bytes".to_vec()));
    let records = Arc::new(InMemoryMediaRecordStore::new());
    let blobs = Arc::new(InMemoryBlobStore::new(STORAGE_BASE));
    let artifacts = Arc::new(ArtifactStore::new(blobs.clone()));
    let thumbnails =
        Arc::new(ArtifactStore::new(blobs.clone()).with_stem(THUMBNAIL_PREFIX, "thumbnail"));
    let event_bus = Arc::new(EventBus::default());

    let registry = Arc::new(OrchestratorRegistry::new(
        Collaborators {
            vendor: vendor.clone(),
            fetcher: fetcher.clone(),
            artifacts: artifacts.clone(),
            records: records.clone(),
            events: Some(event_bus.clone()),
        },
        config.orchestrator,
    ));

    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        registry: registry.clone(),
        records: records.clone(),
        artifacts: artifacts.clone(),
        thumbnails: thumbnails.clone(),
        event_bus: event_bus.clone(),
        assistant: assistant.map(Arc::new),
        images: images.map(Arc::new),
    };

    TestApp {
        router: build_app_router(state, &config),
        vendor,
        fetcher,
        records,
        blobs,
        artifacts,
        thumbnails,
        registry,
        event_bus,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_as(app: Router, session: &str, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("x-session-id", session)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_as(
    app: Router,
    session: &str,
    uri: &str,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-session-id", session)
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_empty(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Next `status` event on an SSE body, parsed from its `data:` line.
/// Keep-alive comments are skipped.
pub async fn next_status_event(body: &mut Body) -> serde_json::Value {
    loop {
        let frame = body.frame().await.unwrap().unwrap();
        let Ok(data) = frame.into_data() else {
            continue;
        };
        let text = String::from_utf8(data.to_vec()).unwrap();
        if let Some(json) = text.lines().find_map(|l| l.strip_prefix("data: ")) {
            return serde_json::from_str(json).unwrap();
        }
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
