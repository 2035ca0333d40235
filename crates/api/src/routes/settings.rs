use axum::routing::get;
use axum::Router;

use crate::handlers::settings;
use crate::state::AppState;

/// Settings routes mounted at `/settings`.
pub fn router() -> Router<AppState> {
    Router::new().route("/prompts", get(settings::list_prompt_settings))
}
