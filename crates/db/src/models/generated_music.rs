//! Generated music models and DTOs.
//!
//! Defines the database row struct for `generated_music` and the create DTO
//! written by the orchestrator when a generation finishes.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tunesmith_core::types::{DbId, Timestamp};

/// Default page size for library listings.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Largest page size a caller may request.
pub const MAX_LIST_LIMIT: i64 = 200;

/// A finished generation, as stored in the `generated_music` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct GeneratedMusic {
    pub id: DbId,
    /// The prompt the caller submitted (not a vendor-supplied title).
    pub prompt: String,
    /// Public, stable URL for playback.
    pub file_url: String,
    /// Storage-internal object key.
    pub file_path: String,
    pub duration_seconds: i32,
    pub created_at: Timestamp,
}

/// Input for inserting a finished generation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateGeneratedMusic {
    pub prompt: String,
    pub file_url: String,
    pub file_path: String,
    pub duration_seconds: i32,
}

/// Clamp a caller-supplied page size into `1..=MAX_LIST_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_applies_default_and_bounds() {
        assert_eq!(clamp_limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(10)), 10);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIST_LIMIT);
    }
}
