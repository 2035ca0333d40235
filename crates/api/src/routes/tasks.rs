use axum::routing::post;
use axum::Router;

use crate::handlers::tasks;
use crate::state::AppState;

/// Task routes mounted at `/tasks`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{task_id}/cancel", post(tasks::cancel_task))
}
