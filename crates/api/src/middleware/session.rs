//! Session extractor for generation endpoints.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tunesmith_pipeline::OrchestratorRegistry;

use crate::state::AppState;

/// Header selecting the caller's generation session.
pub const SESSION_HEADER: &str = "x-session-id";

/// Session key taken from the `x-session-id` header.
///
/// Requests without the header (or with a blank one) share the
/// `"anonymous"` session. Never rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session(pub String);

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok());
        Ok(Session(OrchestratorRegistry::session_key(raw)))
    }
}
