use std::path::PathBuf;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use varnava_core::remote_model::ModelKind;
use varnava_resources::ResourceStatus;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AddModelRequest {
    /// Defaults to `preview`.
    pub kind: Option<ModelKind>,
    pub path: Option<String>,
    pub revision: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveModelRequest {
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DataPathRequest {
    pub path: Option<PathBuf>,
}

/// GET /resources
pub async fn get_status(State(state): State<AppState>) -> Json<ResourceStatus> {
    Json(state.resources.status().await)
}

/// POST /resources/start_downloading
///
/// Starting while a download is running is a no-op; `started` tells the two
/// apart.
pub async fn start_downloading(State(state): State<AppState>) -> Json<Value> {
    let started = state.resources.start_downloading();
    state.resources.notify().await;
    Json(json!({ "status": "ok", "started": started }))
}

/// POST /resources/stop_downloading
pub async fn stop_downloading(State(state): State<AppState>) -> Json<Value> {
    let stopped = state.resources.stop_downloading();
    state.resources.notify().await;
    Json(json!({ "status": "ok", "stopped": stopped }))
}

/// POST /resources/models
pub async fn add_model(
    State(state): State<AppState>,
    body: Option<Json<AddModelRequest>>,
) -> AppResult<Json<Value>> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let path = input.path.ok_or(AppError::MissingField("path"))?;
    let kind = input.kind.unwrap_or(ModelKind::Preview);

    let model = state
        .resources
        .add_model(kind, &path, input.revision.as_deref())
        .await?;
    state.resources.notify().await;

    Ok(Json(json!({ "model": model })))
}

/// POST /resources/models/remove
pub async fn remove_model(
    State(state): State<AppState>,
    body: Option<Json<RemoveModelRequest>>,
) -> AppResult<Json<Value>> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let path = input.path.ok_or(AppError::MissingField("path"))?;

    let model = state.resources.remove_model(&path).await?;
    state.resources.notify().await;

    Ok(Json(json!({ "model": model })))
}

/// POST /resources/update_data_path
///
/// Persisted immediately, used from the next start.
pub async fn update_data_path(
    State(state): State<AppState>,
    body: Option<Json<DataPathRequest>>,
) -> AppResult<Json<Value>> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let path = input.path.ok_or(AppError::MissingField("path"))?;

    state.resources.set_data_root(path).await?;

    Ok(Json(json!({ "status": "ok" })))
}
