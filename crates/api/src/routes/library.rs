//! Route definitions for the library.
//!
//! ```text
//! GET    /library        list_music
//! DELETE /library/{id}   delete_music
//! ```

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::library;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/library", get(library::list_music))
        .route("/library/{id}", delete(library::delete_music))
}
