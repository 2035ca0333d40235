use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use varnava_core::types::{EntityId, Timestamp};

/// A row from the `prompts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: EntityId,
    pub created_at: Timestamp,
    #[serde(rename = "project")]
    pub project_id: EntityId,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrompt {
    pub project_id: EntityId,
    pub value: String,
}
