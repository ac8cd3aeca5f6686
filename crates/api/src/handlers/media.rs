//! Handlers for cover images and video frames.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tunesmith_core::error::CoreError;
use tunesmith_events::{event_types, PlatformEvent};
use tunesmith_storage::StorageError;
use tunesmith_vendor::imagery::{ImageGenerator, ThumbnailRequest, VideoRequest};

use super::discard_or_report;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailResponse {
    pub success: bool,
    pub image_url: String,
    pub file_path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub success: bool,
    pub frames: Vec<String>,
    pub music_url: Option<String>,
    pub title: String,
    pub message: String,
}

fn image_generator(state: &AppState) -> AppResult<&ImageGenerator> {
    state.images.as_deref().ok_or_else(|| {
        AppError::Core(CoreError::Unavailable(
            "Image generation is not configured".into(),
        ))
    })
}

// ---------------------------------------------------------------------------
// POST /generate-thumbnail
// ---------------------------------------------------------------------------

/// Generate a cover image from a prompt (or a title and style) and store it.
pub async fn generate_thumbnail(
    State(state): State<AppState>,
    Json(request): Json<ThumbnailRequest>,
) -> AppResult<Json<ThumbnailResponse>> {
    let prompt = request
        .image_prompt()
        .ok_or_else(|| AppError::BadRequest("Prompt or title is required".into()))?;
    let images = image_generator(&state)?;

    let image = images.thumbnail(&prompt).await?;
    let stored = match state.thumbnails.store(&image.bytes, &image.content_type).await {
        Ok(stored) => stored,
        Err(e) => {
            if let StorageError::UploadExhausted { file_path, .. } = &e {
                discard_or_report(&state, &state.thumbnails, file_path, None).await;
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        file_path = %stored.file_path,
        bytes = image.bytes.len(),
        "Thumbnail generated",
    );
    state.event_bus.publish(
        PlatformEvent::new(event_types::THUMBNAIL_CREATED).with_payload(serde_json::json!({
            "file_path": stored.file_path,
            "public_url": stored.public_url,
        })),
    );

    Ok(Json(ThumbnailResponse {
        success: true,
        image_url: stored.public_url,
        file_path: stored.file_path,
    }))
}

// ---------------------------------------------------------------------------
// POST /generate-video
// ---------------------------------------------------------------------------

/// Generate a short sequence of video frames seeded by a thumbnail.
///
/// The frames are image URLs (data URLs for freshly generated frames);
/// assembling them into a video is left to the client.
pub async fn generate_video(
    State(state): State<AppState>,
    Json(request): Json<VideoRequest>,
) -> AppResult<Json<VideoResponse>> {
    let thumbnail_url = request
        .thumbnail_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::BadRequest("Thumbnail URL is required".into()))?;
    let images = image_generator(&state)?;

    let frames = images
        .video_frames(thumbnail_url, &request.frame_prompts())
        .await?;
    tracing::info!(frames = frames.len(), "Video frames generated");

    Ok(Json(VideoResponse {
        success: true,
        message: format!("Generated {} video frames", frames.len()),
        title: request.title().to_string(),
        music_url: request.music_url.clone(),
        frames,
    }))
}
