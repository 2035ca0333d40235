//! Repository for the `prompts` table.

use sqlx::SqlitePool;
use varnava_core::types::EntityId;

use crate::models::prompt::{CreatePrompt, Prompt};

const COLUMNS: &str = "id, created_at, project_id, value";

pub struct PromptRepo;

impl PromptRepo {
    pub async fn create(pool: &SqlitePool, input: &CreatePrompt) -> Result<Prompt, sqlx::Error> {
        let query = format!(
            "INSERT INTO prompts (id, created_at, project_id, value) \
             VALUES (?1, ?2, ?3, ?4) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Prompt>(&query)
            .bind(EntityId::new_v4())
            .bind(chrono::Utc::now())
            .bind(input.project_id)
            .bind(&input.value)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: EntityId) -> Result<Option<Prompt>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM prompts WHERE id = ?1");
        sqlx::query_as::<_, Prompt>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a prompt only if it belongs to `project_id`.
    pub async fn find_in_project(
        pool: &SqlitePool,
        project_id: EntityId,
        id: EntityId,
    ) -> Result<Option<Prompt>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM prompts WHERE id = ?1 AND project_id = ?2");
        sqlx::query_as::<_, Prompt>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }
}
