use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use varnava_core::error::CoreError;
use varnava_core::settings::GenerationTaskSettings;
use varnava_core::types::EntityId;
use varnava_core::update_events::EVENT_OUTPUT_CREATED;
use varnava_db::models::output::CreateOutput;
use varnava_db::repositories::{OutputRepo, ProjectRepo, PromptRepo};
use varnava_worker::{GenerationOutput, GenerationTask};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Output images are JPEG files named after the output id.
const OUTPUT_EXTENSION: &str = "jpg";

/// Batch size when the client does not send one.
const DEFAULT_BATCH: u32 = 1;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    /// Raw client settings. Stored verbatim on every created output.
    pub settings: Option<Value>,
    /// Output whose image is the source of an upscale or variation.
    pub parent_id: Option<EntityId>,
}

async fn ensure_project_exists(state: &AppState, project_id: EntityId) -> AppResult<()> {
    ProjectRepo::find_by_id(&state.pool, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("project", project_id))?;
    Ok(())
}

/// GET /projects/{project_id}/output/{output_id}
pub async fn get_output(
    State(state): State<AppState>,
    Path((project_id, output_id)): Path<(EntityId, EntityId)>,
) -> AppResult<Json<Value>> {
    ensure_project_exists(&state, project_id).await?;
    let output = OutputRepo::find_in_project(&state.pool, project_id, output_id)
        .await?
        .ok_or_else(|| AppError::not_found("output", output_id))?;
    Ok(Json(json!({ "output": output })))
}

/// POST /projects/{project_id}/prompts/{prompt_id}/generate
///
/// Creates one output row per batch slot, publishes `output.created` for
/// each and queues a single task producing all of them.
pub async fn generate(
    State(state): State<AppState>,
    Path((project_id, prompt_id)): Path<(EntityId, EntityId)>,
    body: Option<Json<GenerateRequest>>,
) -> AppResult<Json<Value>> {
    ensure_project_exists(&state, project_id).await?;
    let prompt = PromptRepo::find_in_project(&state.pool, project_id, prompt_id)
        .await?
        .ok_or_else(|| AppError::not_found("prompt", prompt_id))?;

    let input = body.map(|Json(b)| b).unwrap_or_default();
    let raw_settings = input.settings.unwrap_or_else(|| json!({}));
    let mut settings: GenerationTaskSettings = serde_json::from_value(raw_settings.clone())
        .map_err(|e| CoreError::Validation(format!("invalid settings: {e}")))?;
    settings.initial_url = None;
    if raw_settings.get("batch").is_none() {
        settings.batch = DEFAULT_BATCH;
    }
    settings.validate()?;

    let parent = match input.parent_id {
        Some(parent_id) => Some(
            OutputRepo::find_in_project(&state.pool, project_id, parent_id)
                .await?
                .ok_or_else(|| AppError::not_found("output", parent_id))?,
        ),
        None => None,
    };
    if let Some(parent) = &parent {
        settings.initial_url = Some(state.outputs_dir.join(&parent.url));
    }
    if settings.kind.requires_source_image() && settings.initial_url.is_none() {
        return Err(CoreError::Validation(format!(
            "{} jobs need a parent output",
            settings.kind
        ))
        .into());
    }

    tokio::fs::create_dir_all(state.outputs_dir.join(prompt.id.to_string())).await?;

    let mut created = Vec::with_capacity(settings.batch as usize);
    let mut slots = Vec::with_capacity(settings.batch as usize);
    for _ in 0..settings.batch {
        let id = EntityId::new_v4();
        let url = format!("{}/{id}.{OUTPUT_EXTENSION}", prompt.id);
        let output = OutputRepo::create(
            &state.pool,
            &CreateOutput {
                id,
                prompt_id: prompt.id,
                parent_id: parent.as_ref().map(|p| p.id),
                seed: settings.seed,
                kind: settings.kind.as_str().to_string(),
                settings: raw_settings.clone(),
                url: url.clone(),
            },
        )
        .await?;
        state.channel.send(EVENT_OUTPUT_CREATED, &output);

        slots.push(GenerationOutput {
            id,
            path: state.outputs_dir.join(&url),
        });
        created.push(output);
    }

    let task = GenerationTask::new(prompt.value.clone(), slots, settings, state.progress.clone());
    let task_id = task.id;
    state.worker.submit(task)?;
    tracing::info!(
        task_id = %task_id,
        prompt_id = %prompt.id,
        outputs = created.len(),
        "Generation task queued"
    );

    Ok(Json(json!({
        "prompt": prompt,
        "outputs": created,
        "task": task_id,
    })))
}
