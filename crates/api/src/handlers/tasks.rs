use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use varnava_core::types::EntityId;

use crate::state::AppState;

/// POST /tasks/{task_id}/cancel
///
/// Only tasks still waiting in the queue can be cancelled.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<EntityId>,
) -> Json<Value> {
    let cancelled = state.worker.cancel(task_id);
    tracing::info!(task_id = %task_id, cancelled, "Cancel requested");
    Json(json!({ "cancelled": cancelled }))
}
