pub mod generate;
pub mod health;
pub mod library;

use axum::Router;

use crate::state::AppState;

/// Build the API route tree (health is mounted separately).
///
/// ```text
/// /generate            GET status, POST generate | status | cancel
/// /generate/events     SSE snapshot stream
/// /generate-prompt     prompt assistant
/// /generate-thumbnail  cover image, stored
/// /generate-video      video frames from a thumbnail
/// /library             list
/// /library/{id}        delete
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(generate::router())
        .merge(library::router())
}
