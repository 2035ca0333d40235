pub mod health;
pub mod outputs;
pub mod resources;
pub mod settings;
pub mod tasks;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the route tree served to the desktop client.
///
/// ```text
/// /updates                                          WebSocket update channel
///
/// /resources                                        status (GET)
/// /resources/start_downloading                      start the download run
/// /resources/stop_downloading                       stop the download run
/// /resources/models                                 track a model (POST)
/// /resources/models/remove                          untrack and delete (POST)
/// /resources/update_data_path                       change the data root (POST)
///
/// /settings/prompts                                 generation knobs (GET)
///
/// /projects/{project_id}/prompts/{prompt_id}/generate   queue a task (POST)
/// /projects/{project_id}/output/{output_id}             output lookup (GET)
///
/// /tasks/{task_id}/cancel                           cancel a queued task (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/updates", get(ws::ws_handler))
        .nest("/resources", resources::router())
        .nest("/settings", settings::router())
        .nest("/projects", outputs::router())
        .nest("/tasks", tasks::router())
}
