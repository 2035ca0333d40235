use axum::routing::{get, post};
use axum::Router;

use crate::handlers::outputs;
use crate::state::AppState;

/// Output routes mounted at `/projects`.
///
/// ```text
/// POST /{project_id}/prompts/{prompt_id}/generate   -> generate
/// GET  /{project_id}/output/{output_id}             -> get_output
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{project_id}/prompts/{prompt_id}/generate",
            post(outputs::generate),
        )
        .route("/{project_id}/output/{output_id}", get(outputs::get_output))
}
