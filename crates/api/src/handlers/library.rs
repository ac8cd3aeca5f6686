//! Handlers for the generated-music library.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tunesmith_core::types::DbId;
use tunesmith_db::models::generated_music::clamp_limit;
use tunesmith_events::{event_types, PlatformEvent};

use super::discard_or_report;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// GET /library
// ---------------------------------------------------------------------------

/// List generated tracks, newest first.
pub async fn list_music(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    let items = state.records.list(clamp_limit(params.limit)).await?;
    tracing::debug!(count = items.len(), "Listed generated music");
    Ok(Json(DataResponse { data: items }))
}

// ---------------------------------------------------------------------------
// DELETE /library/{id}
// ---------------------------------------------------------------------------

/// Delete a track and its stored file.
///
/// Idempotent: answers 204 whether or not the row existed. The row goes
/// first so the listing never shows a track whose file is already gone.
/// Any session whose last run produced the track stops reporting it.
pub async fn delete_music(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let Some(music) = state.records.find_by_id(id).await? else {
        tracing::debug!(id, "Delete of unknown track ignored");
        state.registry.forget_record(id).await;
        return Ok(StatusCode::NO_CONTENT);
    };

    let deleted = state.records.delete_by_id(id).await?;
    let sessions = state.registry.forget_record(id).await;
    if sessions > 0 {
        tracing::debug!(id, sessions, "Deleted track dropped from job status");
    }
    if !deleted {
        return Ok(StatusCode::NO_CONTENT);
    }

    discard_or_report(&state, &state.artifacts, &music.file_path, Some(id)).await;

    tracing::info!(id, file_path = %music.file_path, "Generated music deleted");
    state.event_bus.publish(
        PlatformEvent::new(event_types::MEDIA_DELETED)
            .with_record(id)
            .with_payload(serde_json::json!({ "file_path": music.file_path })),
    );

    Ok(StatusCode::NO_CONTENT)
}
