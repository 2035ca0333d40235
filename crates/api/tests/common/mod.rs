#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::RgbImage;
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use varnava_api::config::ServerConfig;
use varnava_api::engine::{spawn_progress_writer, ResourceUpdatePublisher};
use varnava_api::router::build_app_router;
use varnava_api::startup::model_selection;
use varnava_api::state::AppState;
use varnava_core::device::{DeviceKind, DeviceProfile};
use varnava_db::models::project::{CreateProject, Project};
use varnava_db::models::prompt::{CreatePrompt, Prompt};
use varnava_db::repositories::{ProjectRepo, PromptRepo};
use varnava_events::UpdateChannel;
use varnava_pipeline::{
    Latent, Pipeline, PipelineCache, PipelineDescriptor, PipelineError, PipelineFactory,
    PipelineSpec, StepState, SynthesisRequest,
};
use varnava_resources::{
    ConfigStore, FileOutcome, HubError, ModelHub, RepoFile, RepoInfo, ResourceManager,
};
use varnava_worker::GenerationWorker;

/// The only repository the fake hub knows.
pub const KNOWN_REPOSITORY: &str = "org/known";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakePipeline;

impl Pipeline for FakePipeline {
    fn descriptor(&self) -> PipelineDescriptor {
        PipelineDescriptor {
            total_timesteps: 1000,
            latent_channels: 4,
            half_precision: false,
        }
    }

    fn generate(
        &mut self,
        request: &SynthesisRequest,
        on_step: &mut dyn FnMut(&StepState<'_>),
    ) -> Result<Vec<RgbImage>, PipelineError> {
        let latents = vec![Latent::zeros(4, 2, 2); request.batch];
        on_step(&StepState {
            step: 0,
            timestep: 500.0,
            latents: &latents,
        });
        Ok(vec![RgbImage::new(8, 8); request.batch])
    }
}

struct FakeFactory;

impl PipelineFactory for FakeFactory {
    fn device(&self) -> DeviceProfile {
        cpu()
    }

    fn build(&mut self, _spec: &PipelineSpec) -> Result<Box<dyn Pipeline>, PipelineError> {
        Ok(Box::new(FakePipeline))
    }
}

struct FakeHub;

#[async_trait]
impl ModelHub for FakeHub {
    async fn repo_info(&self, repository: &str, _revision: &str) -> Result<RepoInfo, HubError> {
        if repository == KNOWN_REPOSITORY {
            return Ok(RepoInfo {
                sha: "f00d".into(),
                siblings: vec![RepoFile {
                    rfilename: "model_index.json".into(),
                    size: Some(42),
                }],
            });
        }
        Err(HubError::Status {
            status: 404,
            url: repository.to_string(),
        })
    }

    async fn download_file(
        &self,
        _repository: &str,
        _commit: &str,
        _filename: &str,
        _destination: &Path,
        _cancel: &CancellationToken,
    ) -> Result<FileOutcome, HubError> {
        Ok(FileOutcome::AlreadyPresent)
    }
}

fn cpu() -> DeviceProfile {
    DeviceProfile {
        kind: DeviceKind::Cpu,
        total_memory_bytes: 8 * 1024 * 1024 * 1024,
    }
}

// ---------------------------------------------------------------------------
// Test application
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub dir: TempDir,
}

pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        root_dir: root.to_path_buf(),
        synthesis_url: "http://127.0.0.1:0".to_string(),
        hub_endpoint: "http://127.0.0.1:0".to_string(),
        hub_token: None,
    }
}

/// Build the full application on an in-memory database with fake hub and
/// pipeline. Every default model has a materialized snapshot.
pub async fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let pool = varnava_db::create_memory_pool().await.unwrap();
    varnava_db::run_migrations(&pool).await.unwrap();

    let channel = Arc::new(UpdateChannel::new());
    let store = ConfigStore::new(config.config_path(), config.default_data_root());
    let resource_config = store.load();
    let outputs_dir = resource_config.outputs_dir();
    let models = model_selection(&resource_config);

    let resources = Arc::new(
        ResourceManager::new(Arc::new(FakeHub), store, resource_config)
            .with_observer(Arc::new(ResourceUpdatePublisher::new(channel.clone()))),
    );

    let layout = resources.layout().clone();
    for model in [&models.text_to_image, &models.upscaling, &models.image_variation] {
        layout
            .record_commit(&model.repository, &model.revision, "abc")
            .unwrap();
        std::fs::create_dir_all(layout.snapshot_dir(&model.repository, "abc")).unwrap();
    }

    let cache = PipelineCache::new(FakeFactory, models, layout);
    let worker = Arc::new(GenerationWorker::spawn(cache).unwrap());
    let (progress, _writer) = spawn_progress_writer(pool.clone(), channel.clone());

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        channel,
        resources,
        worker,
        progress,
        device: cpu(),
        outputs_dir: Arc::new(outputs_dir),
    };
    let app = build_app_router(state.clone(), &config);

    TestApp { app, state, dir }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub async fn seed_prompt(state: &AppState, value: &str) -> (Project, Prompt) {
    let project = ProjectRepo::create(
        &state.pool,
        &CreateProject {
            title: "Lighthouses".into(),
        },
    )
    .await
    .unwrap();
    let prompt = PromptRepo::create(
        &state.pool,
        &CreatePrompt {
            project_id: project.id,
            value: value.into(),
        },
    )
    .await
    .unwrap();
    (project, prompt)
}

pub fn output_path(state: &AppState, url: &str) -> PathBuf {
    state.outputs_dir.join(url)
}
