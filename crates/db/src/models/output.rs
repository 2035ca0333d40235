//! Generated image rows.
//!
//! `progress` moves from `0.0` to `1.0` while the worker runs the task that
//! owns the row. Rows below `1.0` at process start belong to a task that
//! died with the previous process and are purged.

use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use varnava_core::types::{EntityId, Timestamp};

/// A finished output has exactly this progress.
pub const PROGRESS_COMPLETE: f64 = 1.0;

/// A row from the `outputs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub id: EntityId,
    pub created_at: Timestamp,
    #[serde(rename = "parent")]
    pub parent_id: Option<EntityId>,
    #[serde(rename = "prompt")]
    pub prompt_id: EntityId,
    pub seed: i64,
    pub progress: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub settings: Json<serde_json::Value>,
    /// Image path relative to the outputs directory.
    pub url: String,
    pub is_archived: bool,
    pub is_favorite: bool,
}

impl Output {
    pub fn is_complete(&self) -> bool {
        self.progress >= PROGRESS_COMPLETE
    }
}

/// Insert DTO. The caller picks the id up front because `url` embeds it.
#[derive(Debug, Clone)]
pub struct CreateOutput {
    pub id: EntityId,
    pub prompt_id: EntityId,
    pub parent_id: Option<EntityId>,
    pub seed: i64,
    pub kind: String,
    pub settings: serde_json::Value,
    pub url: String,
}
