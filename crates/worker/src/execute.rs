//! Running one task against the cached pipeline.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use varnava_core::plan::{random_seed, ExecutionPlan};
use varnava_core::settings::GenerationTaskSettings;
use varnava_pipeline::{
    ApproximateDecoder, LoadedPipeline, PipelineCache, PipelineDescriptor, PipelineError,
    PipelineFactory, StepState, SynthesisRequest,
};

use crate::error::WorkerError;
use crate::task::GenerationTask;

/// Intermediate progress never reaches `1.0`; that value is reserved for the
/// single completion call.
const MAX_INTERMEDIATE_PROGRESS: f64 = 0.99;

pub(crate) fn execute<F: PipelineFactory>(
    cache: &mut PipelineCache<F>,
    task: &GenerationTask,
) -> Result<(), WorkerError> {
    cache.ensure(&task.settings).map_err(WorkerError::Load)?;

    let device = cache.device();
    let plan = ExecutionPlan::resolve(&task.settings, &device, random_seed);
    tracing::info!(
        task_id = %task.id,
        kind = %task.settings.kind,
        width = plan.width,
        height = plan.height,
        steps = plan.steps,
        guidance = plan.guidance_scale,
        seed = plan.seed,
        batch = task.outputs.len(),
        "Generating"
    );

    let request = SynthesisRequest {
        prompt: task.prompt.clone(),
        width: plan.width,
        height: plan.height,
        steps: plan.steps,
        guidance_scale: plan.guidance_scale,
        seed: plan.seed,
        batch: task.outputs.len(),
        source_image: load_source_image(&task.settings, &plan)?,
    };

    let LoadedPipeline {
        pipeline, decoder, ..
    } = cache.loaded_mut().ok_or(WorkerError::NotLoaded)?;
    let decoder = decoder.as_ref();

    let mut reporter = ProgressReporter::new(task, plan.seed, pipeline.descriptor());
    let result = pipeline.generate(&request, &mut |state| {
        if let Some(decoder) = decoder {
            write_previews(decoder, state, task);
        }
        reporter.step(state.timestep);
    });
    pipeline.release_transient_memory();
    let images = result?;

    if images.len() != task.outputs.len() {
        return Err(WorkerError::ImageCount {
            expected: task.outputs.len(),
            actual: images.len(),
        });
    }
    for (image, output) in images.iter().zip(&task.outputs) {
        save_image(image, &output.path)?;
    }

    task.observer().on_progress(task, 1.0, plan.seed);
    Ok(())
}

/// Open the conditioning image for kinds that need one. Upscale sources are
/// resized to the planned square edge.
fn load_source_image(
    settings: &GenerationTaskSettings,
    plan: &ExecutionPlan,
) -> Result<Option<RgbImage>, PipelineError> {
    if !settings.kind.requires_source_image() {
        return Ok(None);
    }
    let path = settings
        .initial_url
        .as_ref()
        .ok_or(PipelineError::MissingSourceImage(settings.kind))?;
    let image = image::open(path)?.to_rgb8();

    Ok(Some(match plan.source_dimension {
        Some(edge) => image::imageops::resize(&image, edge, edge, FilterType::Lanczos3),
        None => image,
    }))
}

fn write_previews(decoder: &ApproximateDecoder, state: &StepState<'_>, task: &GenerationTask) {
    for (latent, output) in state.latents.iter().zip(&task.outputs) {
        let result = decoder
            .decode(latent)
            .map_err(|e| e.to_string())
            .and_then(|preview| preview.save(&output.path).map_err(|e| e.to_string()));
        if let Err(e) = result {
            tracing::debug!(output_id = %output.id, error = %e, "Skipped preview");
        }
    }
}

fn save_image(image: &RgbImage, path: &Path) -> Result<(), WorkerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| WorkerError::Save {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(e),
        })?;
    }
    image.save(path).map_err(|source| WorkerError::Save {
        path: path.to_path_buf(),
        source,
    })
}

/// Turns scheduler timesteps into the observer's progress values.
struct ProgressReporter<'a> {
    task: &'a GenerationTask,
    seed: u64,
    descriptor: PipelineDescriptor,
    last: f64,
}

impl<'a> ProgressReporter<'a> {
    fn new(task: &'a GenerationTask, seed: u64, descriptor: PipelineDescriptor) -> Self {
        Self {
            task,
            seed,
            descriptor,
            last: 0.0,
        }
    }

    fn step(&mut self, timestep: f64) {
        let progress = self
            .descriptor
            .progress_at(timestep)
            .min(MAX_INTERMEDIATE_PROGRESS)
            .max(self.last);
        self.last = progress;
        self.task.observer().on_progress(self.task, progress, self.seed);
    }
}
