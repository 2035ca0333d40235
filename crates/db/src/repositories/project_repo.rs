//! Repository for the `projects` table.

use sqlx::SqlitePool;
use varnava_core::types::EntityId;

use crate::models::project::{CreateProject, Project};

const COLUMNS: &str = "id, created_at, title, is_archived";

pub struct ProjectRepo;

impl ProjectRepo {
    pub async fn create(pool: &SqlitePool, input: &CreateProject) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (id, created_at, title) VALUES (?1, ?2, ?3) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(EntityId::new_v4())
            .bind(chrono::Utc::now())
            .bind(&input.title)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: EntityId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = ?1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
