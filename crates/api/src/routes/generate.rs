//! Route definitions for generation.
//!
//! ```text
//! GET, POST  /generate            action-dispatched generate/status/cancel
//! GET        /generate/events     generation_events (SSE)
//! POST       /generate-prompt     generate_prompt
//! POST       /generate-thumbnail  generate_thumbnail
//! POST       /generate-video      generate_video
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{generate, media, prompt};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/generate",
            get(generate::get_generate).post(generate::post_generate),
        )
        .route("/generate/events", get(generate::generation_events))
        .route("/generate-prompt", post(prompt::generate_prompt))
        .route("/generate-thumbnail", post(media::generate_thumbnail))
        .route("/generate-video", post(media::generate_video))
}
