//! Composition root.
//!
//! Builds the [`AppState`] once: database with startup recovery, update
//! channel, resource manager, device probe and the generation worker.

use std::sync::Arc;

use tokio::task::JoinHandle;
use varnava_core::device::{DeviceKind, DeviceProfile};
use varnava_core::remote_model::ModelKind;
use varnava_db::repositories::OutputRepo;
use varnava_db::DbPool;
use varnava_events::UpdateChannel;
use varnava_pipeline::{probe_device, ModelRef, ModelSelection, PipelineCache, ServicePipelineFactory};
use varnava_resources::{ConfigStore, HfHub, HubError, ResourceConfig, ResourceManager};
use varnava_worker::{GenerationWorker, WorkerError};

use crate::config::ServerConfig;
use crate::engine::{spawn_progress_writer, ResourceUpdatePublisher};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Model hub client error: {0}")]
    Hub(#[from] HubError),

    #[error("Generation worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Handles to the background tasks started next to the state.
pub struct Background {
    pub progress_writer: JoinHandle<()>,
}

/// Build the application state. The worker loop starts only after unfinished
/// outputs from a previous run are purged.
pub async fn build_state(config: ServerConfig) -> Result<(AppState, Background), StartupError> {
    tokio::fs::create_dir_all(&config.root_dir).await?;

    // --- Database ---
    let pool = varnava_db::create_pool(&config.database_path()).await?;
    varnava_db::run_migrations(&pool).await?;
    tracing::info!(path = %config.database_path().display(), "Database ready");
    purge_unfinished(&pool).await?;

    // --- Update channel ---
    let channel = Arc::new(UpdateChannel::new());

    // --- Resources ---
    let store = ConfigStore::new(config.config_path(), config.default_data_root());
    let resource_config = store.load();
    let outputs_dir = resource_config.outputs_dir();
    tokio::fs::create_dir_all(&outputs_dir).await?;
    let models = model_selection(&resource_config);

    let hub = Arc::new(HfHub::new(config.hub_endpoint.clone(), config.hub_token.clone())?);
    let resources = Arc::new(
        ResourceManager::new(hub, store, resource_config)
            .with_observer(Arc::new(ResourceUpdatePublisher::new(channel.clone()))),
    );
    tracing::info!(models_dir = %resources.models_dir().display(), "Resource manager created");

    let initial = resources.clone();
    tokio::spawn(async move {
        initial.refresh().await;
        initial.notify().await;
    });

    // --- Generation worker ---
    let device = match probe_device(&config.synthesis_url).await {
        Ok(device) => device,
        Err(e) => {
            tracing::warn!(
                url = %config.synthesis_url,
                error = %e,
                "Synthesis service did not report a device, assuming CPU"
            );
            fallback_device()
        }
    };
    tracing::info!(device = ?device.kind, memory_gib = device.total_memory_gib(), "Compute device");

    let factory = ServicePipelineFactory::new(config.synthesis_url.clone(), device);
    let cache = PipelineCache::new(factory, models, resources.layout().clone());
    let worker = Arc::new(GenerationWorker::spawn(cache)?);

    let (progress, progress_writer) = spawn_progress_writer(pool.clone(), channel.clone());

    let state = AppState {
        pool,
        config: Arc::new(config),
        channel,
        resources,
        worker,
        progress,
        device,
        outputs_dir: Arc::new(outputs_dir),
    };
    Ok((state, Background { progress_writer }))
}

/// Delete outputs left unfinished by a previous process. Their tasks died
/// with it and cannot be resumed.
pub async fn purge_unfinished(pool: &DbPool) -> Result<u64, sqlx::Error> {
    let removed = OutputRepo::delete_unfinished(pool).await?;
    if removed > 0 {
        tracing::info!(removed, "Purged unfinished outputs");
    }
    Ok(removed)
}

/// Worker models from the first tracked model of each kind.
pub fn model_selection(config: &ResourceConfig) -> ModelSelection {
    let mut models = ModelSelection::default();
    if let Some(model) = config.active(ModelKind::Preview) {
        models.text_to_image = ModelRef::new(&model.repository_path, &model.revision);
    }
    if let Some(model) = config.active(ModelKind::Upscale) {
        models.upscaling = ModelRef::new(&model.repository_path, &model.revision);
    }
    if let Some(model) = config.active(ModelKind::Variation) {
        models.image_variation = ModelRef::new(&model.repository_path, &model.revision);
    }
    models
}

fn fallback_device() -> DeviceProfile {
    DeviceProfile {
        kind: DeviceKind::Cpu,
        total_memory_bytes: 0,
    }
}

#[cfg(test)]
mod tests {
    use varnava_core::remote_model::RemoteModel;

    use super::*;

    #[test]
    fn selection_follows_first_tracked_models() {
        let mut config = ResourceConfig::with_defaults("/data");
        config
            .preview_models
            .insert(0, RemoteModel::new("org/custom", Some("main")));

        let models = model_selection(&config);
        assert_eq!(models.text_to_image, ModelRef::new("org/custom", "main"));
        assert_eq!(models.upscaling, ModelSelection::default().upscaling);
    }

    #[test]
    fn variation_weights_come_from_the_downloaded_model() {
        let config = ResourceConfig::with_defaults("/data");
        let variation = config.active(ModelKind::Variation).unwrap();

        let models = model_selection(&config);
        assert_eq!(
            models.image_variation,
            ModelRef::new(&variation.repository_path, &variation.revision)
        );
        assert_eq!(models, ModelSelection::default());
    }

    #[test]
    fn empty_lists_keep_defaults() {
        let config = ResourceConfig {
            data_root_path: "/data".into(),
            preview_models: Vec::new(),
            upscale_models: Vec::new(),
            variation_models: Vec::new(),
        };
        assert_eq!(model_selection(&config), ModelSelection::default());
    }
}
