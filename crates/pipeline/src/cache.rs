//! Keeps at most one pipeline alive and decides when to swap it.
//!
//! A pipeline is reused iff one is loaded and the settings it was built for
//! are structurally equal to the new task's settings (same job kind,
//! sampling method and tiling flag). Anything else releases the current
//! pipeline before the replacement is built, so two pipelines never coexist.

use varnava_core::device::DeviceProfile;
use varnava_core::settings::GenerationTaskSettings;
use varnava_core::snapshot::SnapshotLayout;

use crate::decoder::ApproximateDecoder;
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, PipelineFactory};
use crate::spec::{ModelSelection, PipelineSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Reused,
    Reloaded,
}

/// The resident pipeline and the companion preview decoder.
pub struct LoadedPipeline {
    pub pipeline: Box<dyn Pipeline>,
    pub decoder: Option<ApproximateDecoder>,
    pub spec: PipelineSpec,
    built_for: GenerationTaskSettings,
}

pub struct PipelineCache<F> {
    factory: F,
    models: ModelSelection,
    layout: SnapshotLayout,
    loaded: Option<LoadedPipeline>,
    reloads: u64,
}

impl<F: PipelineFactory> PipelineCache<F> {
    pub fn new(factory: F, models: ModelSelection, layout: SnapshotLayout) -> Self {
        Self {
            factory,
            models,
            layout,
            loaded: None,
            reloads: 0,
        }
    }

    pub fn device(&self) -> DeviceProfile {
        self.factory.device()
    }

    /// Whether serving `settings` requires building a new pipeline.
    pub fn needs_reload(&self, settings: &GenerationTaskSettings) -> bool {
        match &self.loaded {
            Some(loaded) => !loaded.built_for.is_structurally_equal(settings),
            None => true,
        }
    }

    /// Make sure a pipeline able to serve `settings` is loaded.
    ///
    /// On failure nothing is loaded afterwards.
    pub fn ensure(&mut self, settings: &GenerationTaskSettings) -> Result<CacheOutcome, PipelineError> {
        if !self.needs_reload(settings) {
            tracing::debug!(kind = %settings.kind, method = %settings.method, "Reusing loaded pipeline");
            return Ok(CacheOutcome::Reused);
        }

        self.release();

        let device = self.factory.device();
        let spec = PipelineSpec::resolve(settings, &device, &self.models, &self.layout)?;
        tracing::info!(
            variant = ?spec.variant,
            repository = %spec.repository,
            revision = %spec.revision,
            scheduler = ?spec.scheduler,
            tiling = spec.circular_padding,
            attention_slicing = spec.memory.attention_slicing,
            sequential_offload = spec.memory.sequential_offload,
            "Loading pipeline"
        );

        let pipeline = self.factory.build(&spec)?;
        let decoder = ApproximateDecoder::for_pipeline(&pipeline.descriptor());
        self.loaded = Some(LoadedPipeline {
            pipeline,
            decoder,
            spec,
            built_for: settings.clone(),
        });
        self.reloads += 1;
        Ok(CacheOutcome::Reloaded)
    }

    pub fn loaded_mut(&mut self) -> Option<&mut LoadedPipeline> {
        self.loaded.as_mut()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Number of pipelines built so far.
    pub fn reload_count(&self) -> u64 {
        self.reloads
    }

    /// Drop the resident pipeline, if any.
    pub fn release(&mut self) {
        if let Some(mut loaded) = self.loaded.take() {
            tracing::debug!(variant = ?loaded.spec.variant, "Releasing pipeline");
            loaded.pipeline.unload();
        }
    }
}
