//! Handlers for music generation.
//!
//! `/generate` multiplexes its operations on the `action` query parameter:
//!
//! ```text
//! POST /generate?action=generate            start a run (default for POST)
//! GET  /generate?action=status&taskId=...   poll the run (default for GET)
//! POST /generate?action=cancel              cancel the run
//! GET  /generate/events                     SSE stream of snapshots
//! ```
//!
//! Every operation is scoped to the caller's [`Session`].

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tunesmith_core::error::CoreError;
use tunesmith_core::generation::{GenerationRequest, TaskPhase};
use tunesmith_db::models::generated_music::GeneratedMusic;
use tunesmith_pipeline::{JobPhase, JobSnapshot};

use crate::error::{AppError, AppResult};
use crate::middleware::session::Session;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct GenerateQuery {
    pub action: Option<String>,
    #[serde(rename = "taskId")]
    pub task_id: Option<String>,
}

/// Body of `action=generate`.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub instrumental: Option<bool>,
}

impl From<GenerateInput> for GenerationRequest {
    fn from(input: GenerateInput) -> Self {
        Self {
            prompt: input.prompt,
            style: input.style,
            instrumental: input.instrumental,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub task_id: String,
    pub status: TaskPhase,
    pub prompt: String,
}

/// Body of `action=status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub task_id: String,
    pub status: TaskPhase,
    pub phase: JobPhase,
    pub prompt: Option<String>,
    pub elapsed_secs: u64,
    pub polls: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<GeneratedMusic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_remotely: Option<bool>,
}

impl StatusResponse {
    fn from_snapshot(task_id: String, snapshot: JobSnapshot) -> Self {
        let failure = snapshot.error;
        Self {
            task_id,
            status: snapshot.status.unwrap_or(TaskPhase::Pending),
            phase: snapshot.phase,
            prompt: snapshot.prompt,
            elapsed_secs: snapshot.elapsed_secs,
            polls: snapshot.polls,
            music: snapshot.music,
            error: failure.as_ref().map(|f| f.message.clone()),
            error_code: failure.as_ref().map(|f| f.code),
            retryable: failure.as_ref().map(|f| f.retryable),
            generated_remotely: failure.as_ref().map(|f| f.generated_remotely),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

// ---------------------------------------------------------------------------
// /generate dispatch
// ---------------------------------------------------------------------------

/// POST /generate
pub async fn post_generate(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<GenerateQuery>,
    body: Bytes,
) -> AppResult<Response> {
    match query.action.as_deref().unwrap_or("generate") {
        "generate" => Ok(start_generation(&state, &session, &body)
            .await?
            .into_response()),
        "status" => Ok(generation_status(&state, &session, query.task_id)
            .await?
            .into_response()),
        "cancel" => Ok(cancel_generation(&state, &session).await.into_response()),
        other => Err(unknown_action(other)),
    }
}

/// GET /generate
pub async fn get_generate(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<GenerateQuery>,
) -> AppResult<Response> {
    match query.action.as_deref().unwrap_or("status") {
        "status" => Ok(generation_status(&state, &session, query.task_id)
            .await?
            .into_response()),
        action @ ("generate" | "cancel") => Err(AppError::BadRequest(format!(
            "Action '{action}' requires POST"
        ))),
        other => Err(unknown_action(other)),
    }
}

fn unknown_action(action: &str) -> AppError {
    AppError::BadRequest(format!("Unknown action '{action}'"))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Start a run and answer immediately with the vendor task id.
async fn start_generation(
    state: &AppState,
    session: &Session,
    body: &[u8],
) -> AppResult<(StatusCode, Json<StartResponse>)> {
    let input: GenerateInput = if body.is_empty() {
        GenerateInput::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?
    };

    let orchestrator = state.registry.get_or_create(&session.0).await;
    let started = orchestrator.start(input.into()).await?;
    tracing::info!(
        session = %session.0,
        task_id = %started.task_id,
        generation = started.generation,
        "Generation accepted",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            task_id: started.task_id,
            status: TaskPhase::Pending,
            prompt: started.prompt,
        }),
    ))
}

/// Current state of the session's run, which must be the one named by
/// `taskId`.
async fn generation_status(
    state: &AppState,
    session: &Session,
    task_id: Option<String>,
) -> AppResult<Json<StatusResponse>> {
    let task_id = task_id
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("taskId is required".into()))?;

    let not_found = || {
        AppError::Core(CoreError::NotFound {
            entity: "GenerationTask",
            id: task_id.clone(),
        })
    };

    let orchestrator = state.registry.get(&session.0).await.ok_or_else(not_found)?;
    let snapshot = orchestrator.snapshot().await;
    if snapshot.task_id.as_deref() != Some(task_id.as_str()) {
        return Err(not_found());
    }

    Ok(Json(StatusResponse::from_snapshot(task_id, snapshot)))
}

async fn cancel_generation(state: &AppState, session: &Session) -> Json<CancelResponse> {
    let cancelled = match state.registry.get(&session.0).await {
        Some(orchestrator) => orchestrator.cancel().await,
        None => false,
    };
    Json(CancelResponse { cancelled })
}

// ---------------------------------------------------------------------------
// GET /generate/events
// ---------------------------------------------------------------------------

/// Stream the session's snapshots as `status` events.
///
/// The current snapshot is sent first, then one event per change. A
/// session that has never started a run answers 404.
pub async fn generation_events(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let orchestrator = state.registry.get(&session.0).await.ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "GenerationSession",
            id: session.0.clone(),
        })
    })?;
    tracing::debug!(session = %session.0, "Status stream opened");

    let stream = WatchStream::new(orchestrator.subscribe()).map(|snapshot| {
        let data = serde_json::to_string(&snapshot).unwrap_or_else(|e| {
            serde_json::json!({ "error": e.to_string() }).to_string()
        });
        Ok::<Event, Infallible>(Event::default().event("status").data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
