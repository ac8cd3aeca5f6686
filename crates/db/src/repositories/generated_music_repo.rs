//! Repository for the `generated_music` table.

use sqlx::PgPool;
use tunesmith_core::types::DbId;

use crate::models::generated_music::{CreateGeneratedMusic, GeneratedMusic};

/// Column list for generated_music queries.
const COLUMNS: &str = "id, prompt, file_url, file_path, duration_seconds, created_at";

/// Provides CRUD operations for the generated-media library.
pub struct GeneratedMusicRepo;

impl GeneratedMusicRepo {
    /// Insert a finished generation, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateGeneratedMusic,
    ) -> Result<GeneratedMusic, sqlx::Error> {
        let query = format!(
            "INSERT INTO generated_music (prompt, file_url, file_path, duration_seconds)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GeneratedMusic>(&query)
            .bind(&input.prompt)
            .bind(&input.file_url)
            .bind(&input.file_path)
            .bind(input.duration_seconds)
            .fetch_one(pool)
            .await
    }

    /// Find a row by its primary key.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<GeneratedMusic>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generated_music WHERE id = $1");
        sqlx::query_as::<_, GeneratedMusic>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List the most recent rows, newest first.
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<GeneratedMusic>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generated_music
             ORDER BY created_at DESC, id DESC
             LIMIT $1"
        );
        sqlx::query_as::<_, GeneratedMusic>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Delete a row. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM generated_music WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
