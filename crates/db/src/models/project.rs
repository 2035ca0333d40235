use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use varnava_core::types::{EntityId, Timestamp};

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: EntityId,
    pub created_at: Timestamp,
    pub title: String,
    pub is_archived: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub title: String,
}
