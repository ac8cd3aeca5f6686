//! Handler for the prompt assistant.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tunesmith_core::error::CoreError;
use tunesmith_vendor::assist::PromptHints;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub prompt: String,
}

/// POST /generate-prompt
///
/// Turn optional title, style and lyrics hints into a ready music prompt.
/// Answers 503 when no assistant is configured.
pub async fn generate_prompt(
    State(state): State<AppState>,
    Json(hints): Json<PromptHints>,
) -> AppResult<Json<PromptResponse>> {
    let assistant = state.assistant.as_ref().ok_or_else(|| {
        AppError::Core(CoreError::Unavailable(
            "Prompt assistant is not configured".into(),
        ))
    })?;

    let prompt = assistant.suggest(&hints).await?;
    tracing::info!(chars = prompt.chars().count(), "Prompt suggestion generated");
    Ok(Json(PromptResponse { prompt }))
}
