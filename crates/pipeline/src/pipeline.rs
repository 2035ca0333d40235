//! Traits at the black-box boundary plus the values crossing it.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use varnava_core::device::DeviceProfile;

use crate::error::PipelineError;
use crate::spec::PipelineSpec;

/// Intermediate latent state of one batch slot, channel-major (`c, h, w`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Latent {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl Latent {
    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
            data: vec![0.0; channels * height * width],
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.channels * self.height * self.width
    }

    #[inline]
    pub fn get(&self, channel: usize, y: usize, x: usize) -> f32 {
        self.data[(channel * self.height + y) * self.width + x]
    }
}

/// What the pipeline reports on every denoising step.
#[derive(Debug)]
pub struct StepState<'a> {
    pub step: u32,
    /// Current scheduler timestep. Counts down towards zero.
    pub timestep: f64,
    /// One latent per batch slot, when the pipeline exposes them.
    pub latents: &'a [Latent],
}

/// Static facts about a built pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    /// The scheduler's `num_train_timesteps`.
    pub total_timesteps: u32,
    pub latent_channels: usize,
    pub half_precision: bool,
}

impl PipelineDescriptor {
    /// Fraction of the denoising schedule already covered at `timestep`.
    pub fn progress_at(&self, timestep: f64) -> f64 {
        if self.total_timesteps == 0 {
            return 0.0;
        }
        (1.0 - timestep / f64::from(self.total_timesteps)).clamp(0.0, 1.0)
    }
}

/// One invocation of a pipeline.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f64,
    pub seed: u64,
    /// Number of images produced together.
    pub batch: usize,
    /// Conditioning image for upscale and variation jobs, already resized.
    pub source_image: Option<RgbImage>,
}

/// A loaded synthesis pipeline.
pub trait Pipeline: Send {
    fn descriptor(&self) -> PipelineDescriptor;

    /// Run the whole schedule. `on_step` is called once per step in
    /// increasing step order. Returns one final image per batch slot.
    fn generate(
        &mut self,
        request: &SynthesisRequest,
        on_step: &mut dyn FnMut(&StepState<'_>),
    ) -> Result<Vec<RgbImage>, PipelineError>;

    /// Give back caches and scratch buffers after a task.
    fn release_transient_memory(&mut self) {}

    /// Free the weights. Called once before the pipeline is dropped.
    fn unload(&mut self) {}
}

/// Builds pipelines for a device.
pub trait PipelineFactory: Send {
    fn device(&self) -> DeviceProfile;

    fn build(&mut self, spec: &PipelineSpec) -> Result<Box<dyn Pipeline>, PipelineError>;
}
