use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunesmith_api::background;
use tunesmith_api::config::ServerConfig;
use tunesmith_api::router::build_app_router;
use tunesmith_api::state::AppState;
use tunesmith_db::store::{MediaRecordStore, PgMediaRecordStore};
use tunesmith_events::{EventBus, PlatformEvent};
use tunesmith_pipeline::{Collaborators, OrchestratorRegistry};
use tunesmith_storage::http::HttpBlobStore;
use tunesmith_storage::keys::THUMBNAIL_PREFIX;
use tunesmith_storage::ArtifactStore;
use tunesmith_vendor::assist::PromptAssistant;
use tunesmith_vendor::imagery::ImageGenerator;
use tunesmith_vendor::{HttpArtifactFetcher, HttpTaskClient};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "tunesmith_api=debug,tunesmith_pipeline=debug,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = tunesmith_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    tunesmith_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    tunesmith_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let event_log_handle = tokio::spawn(log_events(event_bus.subscribe()));

    // --- Collaborators ---
    let vendor = HttpTaskClient::new(config.vendor.clone()).expect("Failed to build vendor client");
    let fetcher = HttpArtifactFetcher::new(config.vendor.request_timeout)
        .expect("Failed to build download client");
    let blobs = HttpBlobStore::new(config.storage.clone()).expect("Failed to build storage client");
    let blobs = Arc::new(blobs);
    let artifacts = Arc::new(ArtifactStore::new(blobs.clone()));
    let thumbnails = Arc::new(ArtifactStore::new(blobs).with_stem(THUMBNAIL_PREFIX, "thumbnail"));
    let records: Arc<dyn MediaRecordStore> = Arc::new(PgMediaRecordStore::new(pool.clone()));

    let assistant = config
        .assist
        .clone()
        .map(PromptAssistant::new)
        .transpose()
        .expect("Failed to build prompt assistant client")
        .map(Arc::new);
    let images = config
        .assist
        .clone()
        .map(ImageGenerator::new)
        .transpose()
        .expect("Failed to build image generation client")
        .map(Arc::new);
    if assistant.is_none() {
        tracing::info!("PROMPT_ASSIST_API_KEY not set, prompt assistant and imagery disabled");
    }

    let orchestrators = Arc::new(OrchestratorRegistry::new(
        Collaborators {
            vendor: Arc::new(vendor),
            fetcher: Arc::new(fetcher),
            artifacts: Arc::clone(&artifacts),
            records: Arc::clone(&records),
            events: Some(Arc::clone(&event_bus)),
        },
        config.orchestrator,
    ));
    tracing::info!(
        poll_interval_secs = config.orchestrator.poll_interval.as_secs(),
        max_poll_attempts = config.orchestrator.max_poll_attempts,
        "Generation orchestrators ready",
    );

    // --- Background tasks ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(background::session_sweep::run(
        Arc::clone(&orchestrators),
        config.orchestrator.session_ttl,
        sweep_cancel.clone(),
    ));

    // --- App state ---
    let config = Arc::new(config);
    let state = AppState {
        pool: Some(pool.clone()),
        config: Arc::clone(&config),
        registry: Arc::clone(&orchestrators),
        records,
        artifacts,
        thumbnails,
        event_bus: Arc::clone(&event_bus),
        assistant,
        images,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    let _ = sweep_handle.await;

    orchestrators
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;

    // Dropping the last sender closes the channel and ends the event log.
    drop(orchestrators);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), event_log_handle).await;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Log every platform event until the bus closes.
async fn log_events(mut rx: broadcast::Receiver<PlatformEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => tracing::info!(
                event_type = %event.event_type,
                session = event.session.as_deref().unwrap_or("-"),
                generation = event.generation,
                record_id = event.record_id,
                "Platform event",
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log lagged behind the bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
