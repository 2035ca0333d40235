use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use varnava_core::remote_model::{ModelKind, DEFAULT_PREVIEW_REPOSITORY};
use varnava_core::settings::{GenerationTaskSettings, SamplingMethod, AUTO_SEED};

use crate::state::AppState;

/// GET /settings/prompts
///
/// The tunable generation knobs with their ranges and defaults, plus the
/// device-dependent dimensions.
///
/// The `model` entry is informational. Its values are the fully downloaded
/// preview models and its default is the active one, which is what the
/// worker loads for every preview task. Submitted task settings do not
/// select a model; making another model active means reordering the tracked
/// list and restarting.
pub async fn list_prompt_settings(State(state): State<AppState>) -> Json<Value> {
    let config = state.resources.config().await;
    let active = config
        .active(ModelKind::Preview)
        .map(|model| model.repository_path.clone())
        .unwrap_or_else(|| DEFAULT_PREVIEW_REPOSITORY.to_string());
    let mut models: Vec<String> = config
        .preview_models
        .iter()
        .filter(|model| model.is_downloaded())
        .map(|model| model.repository_path.clone())
        .collect();
    if !models.contains(&active) {
        models.insert(0, active.clone());
    }

    let methods: Vec<&str> = SamplingMethod::ALL.iter().map(|m| m.name()).collect();
    let defaults = GenerationTaskSettings::default();

    Json(json!({
        "constants": {
            "base_dimension": state.device.base_dimension(),
            "upscaled_dimension": state.device.upscaled_dimension(),
        },
        "settings": [
            {
                "name": "model",
                "type": "array",
                "values": models,
                "default": active,
            },
            {
                "name": "dimensions",
                "type": "range",
                "min": 0.5,
                "max": 2.0,
                "step": 0.01,
                "default": defaults.dimensions,
            },
            {
                "name": "batch",
                "type": "range",
                "min": 1,
                "max": 4,
                "step": 1,
                "default": defaults.batch,
            },
            {
                "name": "method",
                "type": "array",
                "values": methods,
                "default": defaults.method,
            },
            {
                "name": "strength",
                "type": "range",
                "min": 0.0,
                "max": 1.0,
                "step": 0.01,
                "default": defaults.strength,
            },
            {
                "name": "steps",
                "type": "range",
                "min": 1,
                "max": 300,
                "step": 1,
                "default": defaults.steps,
            },
            {
                "name": "seed",
                "type": "array",
                "values": [AUTO_SEED],
                "default": AUTO_SEED,
                "displayNames": { "-1": "Auto" },
                "custom": "number",
            },
            {
                "name": "seamless",
                "type": "range",
                "min": 0,
                "max": 1,
                "step": 1,
                "default": defaults.seamless,
                "displayNames": { "0": "No", "1": "Yes" },
            },
        ],
    }))
}
