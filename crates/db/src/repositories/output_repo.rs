//! Repository for the `outputs` table.
//!
//! Besides plain CRUD this carries the two writes the generation worker
//! depends on: the per-step progress update and the startup purge of rows
//! left unfinished by a previous process.

use sqlx::types::Json;
use sqlx::SqlitePool;
use varnava_core::types::EntityId;

use crate::models::output::{CreateOutput, Output, PROGRESS_COMPLETE};

const COLUMNS: &str = "\
    id, created_at, parent_id, prompt_id, seed, progress, kind, \
    settings, url, is_archived, is_favorite";

pub struct OutputRepo;

impl OutputRepo {
    pub async fn create(pool: &SqlitePool, input: &CreateOutput) -> Result<Output, sqlx::Error> {
        let query = format!(
            "INSERT INTO outputs (id, created_at, parent_id, prompt_id, seed, kind, settings, url) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Output>(&query)
            .bind(input.id)
            .bind(chrono::Utc::now())
            .bind(input.parent_id)
            .bind(input.prompt_id)
            .bind(input.seed)
            .bind(&input.kind)
            .bind(Json(&input.settings))
            .bind(&input.url)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: EntityId) -> Result<Option<Output>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM outputs WHERE id = ?1");
        sqlx::query_as::<_, Output>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an output only if it belongs to a prompt of `project_id`.
    pub async fn find_in_project(
        pool: &SqlitePool,
        project_id: EntityId,
        id: EntityId,
    ) -> Result<Option<Output>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM outputs \
             WHERE id = ?1 AND prompt_id IN (SELECT id FROM prompts WHERE project_id = ?2)"
        );
        sqlx::query_as::<_, Output>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// Outputs of a prompt, newest first.
    pub async fn list_by_prompt(
        pool: &SqlitePool,
        prompt_id: EntityId,
    ) -> Result<Vec<Output>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM outputs WHERE prompt_id = ?1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Output>(&query)
            .bind(prompt_id)
            .fetch_all(pool)
            .await
    }

    /// Record generation progress. Returns the updated row, or `None` if the
    /// output was deleted in the meantime.
    pub async fn update_progress(
        pool: &SqlitePool,
        id: EntityId,
        progress: f64,
        seed: i64,
    ) -> Result<Option<Output>, sqlx::Error> {
        let query = format!(
            "UPDATE outputs SET progress = ?2, seed = ?3 WHERE id = ?1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Output>(&query)
            .bind(id)
            .bind(progress.clamp(0.0, PROGRESS_COMPLETE))
            .bind(seed)
            .fetch_optional(pool)
            .await
    }

    /// Delete every output whose generation never finished. Returns the
    /// number of rows removed.
    pub async fn delete_unfinished(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM outputs WHERE progress < ?1")
            .bind(PROGRESS_COMPLETE)
            .execute(pool)
            .await?;
        tracing::debug!(rows = result.rows_affected(), "Deleted unfinished outputs");
        Ok(result.rows_affected())
    }
}
