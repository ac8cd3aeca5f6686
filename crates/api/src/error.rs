use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tunesmith_core::error::{CoreError, GenerationError};
use tunesmith_db::store::RecordStoreError;
use tunesmith_storage::StorageError;
use tunesmith_vendor::assist::AssistError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain and adapter errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `tunesmith_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A generation run could not be started.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Records(#[from] RecordStoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Assist(#[from] AssistError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unavailable(msg) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg.clone())
                }
                CoreError::Internal(msg) => internal(msg),
            },

            // --- Generation errors ---
            AppError::Generation(err) => (generation_status(err), err.code(), err.to_string()),

            // --- Adapter errors ---
            AppError::Records(err) => internal(&err.to_string()),
            AppError::Storage(err) => internal(&err.to_string()),
            AppError::Assist(err) => match err {
                AssistError::RateLimited => {
                    (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", err.to_string())
                }
                AssistError::PaymentRequired => (
                    StatusCode::PAYMENT_REQUIRED,
                    "PAYMENT_REQUIRED",
                    "Payment required. Please add credits to continue.".to_string(),
                ),
                AssistError::Empty => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EMPTY_PROMPT",
                    err.to_string(),
                ),
                AssistError::NoImage => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "NO_IMAGE",
                    err.to_string(),
                ),
                AssistError::InvalidImage(_)
                | AssistError::Gateway { .. }
                | AssistError::Request(_) => {
                    tracing::error!(error = %err, "Prompt assistant error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "ASSIST_FAILED",
                        "AI gateway error".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal(detail: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// HTTP status for a generation error returned synchronously by a handler.
///
/// - `Busy` and `Cancelled` map to 409.
/// - `InvalidRequest` maps to 400.
/// - Everything else (vendor unreachable, later-stage failures) maps to 500.
fn generation_status(err: &GenerationError) -> StatusCode {
    match err {
        GenerationError::Busy | GenerationError::Cancelled => StatusCode::CONFLICT,
        GenerationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
