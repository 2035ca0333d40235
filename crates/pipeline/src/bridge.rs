//! HTTP bridge to the out-of-process synthesis service.
//!
//! The service owns the model runtime and exposes:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET` | `/device` | Device kind and total memory |
//! | `POST` | `/pipelines` | Build a pipeline from a [`PipelineSpec`] |
//! | `POST` | `/pipelines/{id}/generate` | Run it, streaming NDJSON step events |
//! | `POST` | `/pipelines/{id}/release` | Free transient device memory |
//! | `DELETE` | `/pipelines/{id}` | Unload it |
//!
//! Generation runs on the worker thread, so the pipeline side uses the
//! blocking client. The client is created lazily on first use because a
//! blocking client must not be created or dropped inside the async runtime.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use varnava_core::device::DeviceProfile;

use crate::error::PipelineError;
use crate::pipeline::{Latent, Pipeline, PipelineDescriptor, PipelineFactory, StepState, SynthesisRequest};
use crate::spec::PipelineSpec;

/// Timeout for the device probe and pipeline management calls. Generation
/// itself has no timeout.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BuildResponse {
    pipeline_id: String,
    total_timesteps: u32,
    latent_channels: usize,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
    width: u32,
    height: u32,
    steps: u32,
    guidance_scale: f64,
    seed: u64,
    batch: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_image: Option<&'a Path>,
}

/// One line of the `/generate` response stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum ServiceEvent {
    Step {
        step: u32,
        timestep: f64,
        #[serde(default)]
        latents: Vec<Latent>,
    },
    Done {
        images: Vec<PathBuf>,
    },
    Error {
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Device probe
// ---------------------------------------------------------------------------

/// Ask the service which device it runs on.
pub async fn probe_device(base_url: &str) -> Result<DeviceProfile, PipelineError> {
    let response = reqwest::Client::new()
        .get(format!("{base_url}/device"))
        .timeout(CONTROL_TIMEOUT)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(PipelineError::Service {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<DeviceProfile>().await?)
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

pub struct ServicePipelineFactory {
    base_url: String,
    device: DeviceProfile,
    client: Option<reqwest::blocking::Client>,
}

impl ServicePipelineFactory {
    pub fn new(base_url: impl Into<String>, device: DeviceProfile) -> Self {
        Self {
            base_url: base_url.into(),
            device,
            client: None,
        }
    }

    fn client(&mut self) -> Result<reqwest::blocking::Client, PipelineError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()?;
        self.client = Some(client.clone());
        Ok(client)
    }
}

impl PipelineFactory for ServicePipelineFactory {
    fn device(&self) -> DeviceProfile {
        self.device
    }

    fn build(&mut self, spec: &PipelineSpec) -> Result<Box<dyn Pipeline>, PipelineError> {
        let client = self.client()?;
        let response = client
            .post(format!("{}/pipelines", self.base_url))
            .timeout(CONTROL_TIMEOUT)
            .json(spec)
            .send()?;
        let built: BuildResponse = ensure_success(response)?.json()?;

        tracing::debug!(pipeline_id = %built.pipeline_id, "Synthesis service built pipeline");
        Ok(Box::new(ServicePipeline {
            client,
            base_url: self.base_url.clone(),
            id: built.pipeline_id,
            descriptor: PipelineDescriptor {
                total_timesteps: built.total_timesteps,
                latent_channels: built.latent_channels,
                half_precision: spec.half_precision,
            },
        }))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

struct ServicePipeline {
    client: reqwest::blocking::Client,
    base_url: String,
    id: String,
    descriptor: PipelineDescriptor,
}

impl ServicePipeline {
    fn url(&self, suffix: &str) -> String {
        format!("{}/pipelines/{}{}", self.base_url, self.id, suffix)
    }

    fn run(
        &self,
        request: &SynthesisRequest,
        source: Option<&Path>,
        on_step: &mut dyn FnMut(&StepState<'_>),
    ) -> Result<Vec<RgbImage>, PipelineError> {
        let body = GenerateBody {
            prompt: &request.prompt,
            width: request.width,
            height: request.height,
            steps: request.steps,
            guidance_scale: request.guidance_scale,
            seed: request.seed,
            batch: request.batch,
            source_image: source,
        };
        let response = self.client.post(self.url("/generate")).json(&body).send()?;
        let response = ensure_success(response)?;

        let paths = read_events(BufReader::new(response), on_step)?;
        let mut images = Vec::with_capacity(paths.len());
        for path in paths {
            images.push(image::open(&path)?.to_rgb8());
            // Staged by the service for this request only.
            let _ = std::fs::remove_file(&path);
        }
        Ok(images)
    }
}

impl Pipeline for ServicePipeline {
    fn descriptor(&self) -> PipelineDescriptor {
        self.descriptor
    }

    fn generate(
        &mut self,
        request: &SynthesisRequest,
        on_step: &mut dyn FnMut(&StepState<'_>),
    ) -> Result<Vec<RgbImage>, PipelineError> {
        let staged = match &request.source_image {
            Some(source) => {
                let path = std::env::temp_dir()
                    .join(format!("varnava-source-{}.png", uuid::Uuid::new_v4()));
                source.save(&path)?;
                Some(path)
            }
            None => None,
        };

        let result = self.run(request, staged.as_deref(), on_step);

        if let Some(path) = staged {
            let _ = std::fs::remove_file(path);
        }
        result
    }

    fn release_transient_memory(&mut self) {
        let result = self
            .client
            .post(self.url("/release"))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .map_err(PipelineError::from)
            .and_then(ensure_success);
        if let Err(e) = result {
            tracing::warn!(pipeline_id = %self.id, error = %e, "Failed to release transient memory");
        }
    }

    fn unload(&mut self) {
        let result = self
            .client
            .delete(self.url(""))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .map_err(PipelineError::from)
            .and_then(ensure_success);
        if let Err(e) = result {
            tracing::warn!(pipeline_id = %self.id, error = %e, "Failed to unload pipeline");
        }
    }
}

// ---- private helpers ----

fn ensure_success(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, PipelineError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(PipelineError::Service {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Consume the NDJSON event stream, forwarding step events. Returns the
/// staged image paths from the terminal `done` event.
fn read_events(
    reader: impl BufRead,
    on_step: &mut dyn FnMut(&StepState<'_>),
) -> Result<Vec<PathBuf>, PipelineError> {
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: ServiceEvent =
            serde_json::from_str(&line).map_err(|e| PipelineError::Decode(e.to_string()))?;
        match event {
            ServiceEvent::Step {
                step,
                timestep,
                latents,
            } => on_step(&StepState {
                step,
                timestep,
                latents: &latents,
            }),
            ServiceEvent::Done { images } => return Ok(images),
            ServiceEvent::Error { message } => return Err(PipelineError::Synthesis(message)),
        }
    }
    Err(PipelineError::Decode(
        "event stream ended before completion".to_string(),
    ))
}
