use axum::routing::{get, post};
use axum::Router;

use crate::handlers::resources;
use crate::state::AppState;

/// Resource routes mounted at `/resources`.
///
/// The download toggles also answer GET for older clients.
///
/// ```text
/// GET       /                    -> get_status
/// GET|POST  /start_downloading   -> start_downloading
/// GET|POST  /stop_downloading    -> stop_downloading
/// POST      /models              -> add_model
/// POST      /models/remove       -> remove_model
/// POST      /update_data_path    -> update_data_path
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(resources::get_status))
        .route(
            "/start_downloading",
            get(resources::start_downloading).post(resources::start_downloading),
        )
        .route(
            "/stop_downloading",
            get(resources::stop_downloading).post(resources::stop_downloading),
        )
        .route("/models", post(resources::add_model))
        .route("/models/remove", post(resources::remove_model))
        .route("/update_data_path", post(resources::update_data_path))
}
