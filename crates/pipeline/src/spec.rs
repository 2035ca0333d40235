//! What to build for a task: variant, weights, sampler, tiling and memory
//! measures.
//!
//! Tiling is an explicit flag on the spec. Nothing global is patched when it
//! is on, so a tiled text-to-image pipeline cannot leak circular padding into
//! the next upscaling or variation pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use varnava_core::device::DeviceProfile;
use varnava_core::remote_model::{
    DEFAULT_MODEL_REVISION, DEFAULT_PREVIEW_REPOSITORY, DEFAULT_UPSCALE_REPOSITORY,
    DEFAULT_VARIATION_REPOSITORY, DEFAULT_VARIATION_REVISION,
};
use varnava_core::settings::{GenerationTaskSettings, JobKind, SamplingMethod};
use varnava_core::snapshot::SnapshotLayout;

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// PipelineVariant
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVariant {
    TextToImage,
    Upscaling,
    ImageVariation,
}

impl From<JobKind> for PipelineVariant {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::Preview => Self::TextToImage,
            JobKind::Upscale => Self::Upscaling,
            JobKind::Variation => Self::ImageVariation,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryPolicy
// ---------------------------------------------------------------------------

/// Memory-saving measures applied when a pipeline is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPolicy {
    pub attention_slicing: bool,
    pub sequential_offload: bool,
}

impl MemoryPolicy {
    /// Upscaling always runs in the cheapest mode. Other kinds slice
    /// attention on low-memory devices.
    pub fn for_job(kind: JobKind, device: &DeviceProfile) -> Self {
        match kind {
            JobKind::Upscale => Self {
                attention_slicing: true,
                sequential_offload: true,
            },
            JobKind::Preview | JobKind::Variation => Self {
                attention_slicing: device.is_low_memory(),
                sequential_offload: false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Model selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub repository: String,
    pub revision: String,
}

impl ModelRef {
    pub fn new(repository: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            revision: revision.into(),
        }
    }
}

/// The repository used for each pipeline variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub text_to_image: ModelRef,
    pub upscaling: ModelRef,
    pub image_variation: ModelRef,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            text_to_image: ModelRef::new(DEFAULT_PREVIEW_REPOSITORY, DEFAULT_MODEL_REVISION),
            upscaling: ModelRef::new(DEFAULT_UPSCALE_REPOSITORY, DEFAULT_MODEL_REVISION),
            image_variation: ModelRef::new(DEFAULT_VARIATION_REPOSITORY, DEFAULT_VARIATION_REVISION),
        }
    }
}

impl ModelSelection {
    pub fn for_variant(&self, variant: PipelineVariant) -> &ModelRef {
        match variant {
            PipelineVariant::TextToImage => &self.text_to_image,
            PipelineVariant::Upscaling => &self.upscaling,
            PipelineVariant::ImageVariation => &self.image_variation,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineSpec
// ---------------------------------------------------------------------------

/// Everything a [`PipelineFactory`](crate::PipelineFactory) needs to build a
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub variant: PipelineVariant,
    pub repository: String,
    pub revision: String,
    /// Local snapshot holding the weights.
    pub snapshot_path: PathBuf,
    /// `None` keeps the pipeline's default sampler.
    pub scheduler: Option<SamplingMethod>,
    /// Seamless tiling. Only text-to-image pipelines support it.
    pub circular_padding: bool,
    pub memory: MemoryPolicy,
    pub half_precision: bool,
}

impl PipelineSpec {
    /// Resolve the spec for `settings` against the local model cache.
    ///
    /// Fails with [`PipelineError::MissingWeights`] when the snapshot is not
    /// on disk.
    pub fn resolve(
        settings: &GenerationTaskSettings,
        device: &DeviceProfile,
        models: &ModelSelection,
        layout: &SnapshotLayout,
    ) -> Result<Self, PipelineError> {
        let variant = PipelineVariant::from(settings.kind);
        let model = models.for_variant(variant);

        let snapshot_path = layout
            .resolve_snapshot(&model.repository, &model.revision)
            .ok_or_else(|| PipelineError::MissingWeights {
                repository: model.repository.clone(),
                revision: model.revision.clone(),
            })?;

        Ok(Self {
            variant,
            repository: model.repository.clone(),
            revision: model.revision.clone(),
            snapshot_path,
            scheduler: SamplingMethod::parse(&settings.method),
            circular_padding: settings.is_seamless() && variant == PipelineVariant::TextToImage,
            memory: MemoryPolicy::for_job(settings.kind, device),
            half_precision: device.half_precision(),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use varnava_core::device::DeviceKind;

    use super::*;

    fn device(gib: u64) -> DeviceProfile {
        DeviceProfile {
            kind: DeviceKind::Cuda,
            total_memory_bytes: gib * 1024 * 1024 * 1024,
        }
    }

    fn layout_with(models: &ModelSelection) -> (tempfile::TempDir, SnapshotLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = SnapshotLayout::new(dir.path());
        for model in [&models.text_to_image, &models.upscaling, &models.image_variation] {
            layout
                .record_commit(&model.repository, &model.revision, "c0ffee")
                .unwrap();
            std::fs::create_dir_all(layout.snapshot_dir(&model.repository, "c0ffee")).unwrap();
        }
        (dir, layout)
    }

    #[test]
    fn upscaling_always_offloads() {
        let policy = MemoryPolicy::for_job(JobKind::Upscale, &device(48));
        assert!(policy.attention_slicing);
        assert!(policy.sequential_offload);
    }

    #[test]
    fn low_memory_devices_slice_attention() {
        assert!(MemoryPolicy::for_job(JobKind::Preview, &device(8)).attention_slicing);
        assert!(!MemoryPolicy::for_job(JobKind::Preview, &device(24)).attention_slicing);
        assert!(!MemoryPolicy::for_job(JobKind::Variation, &device(8)).sequential_offload);
    }

    #[test]
    fn missing_snapshot_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SnapshotLayout::new(dir.path());

        let err = PipelineSpec::resolve(
            &GenerationTaskSettings::default(),
            &device(24),
            &ModelSelection::default(),
            &layout,
        )
        .unwrap_err();

        assert!(err.is_configuration());
        assert_matches!(err, PipelineError::MissingWeights { repository, .. } => {
            assert_eq!(repository, DEFAULT_PREVIEW_REPOSITORY);
        });
    }

    #[test]
    fn tiling_only_applies_to_text_to_image() {
        let models = ModelSelection::default();
        let (_dir, layout) = layout_with(&models);

        let tiled_preview = GenerationTaskSettings {
            seamless: 1,
            ..GenerationTaskSettings::default()
        };
        let tiled_upscale = GenerationTaskSettings {
            kind: JobKind::Upscale,
            ..tiled_preview.clone()
        };

        let preview = PipelineSpec::resolve(&tiled_preview, &device(24), &models, &layout).unwrap();
        let upscale = PipelineSpec::resolve(&tiled_upscale, &device(24), &models, &layout).unwrap();

        assert!(preview.circular_padding);
        assert!(!upscale.circular_padding);
        assert_eq!(upscale.variant, PipelineVariant::Upscaling);
        assert_eq!(upscale.repository, DEFAULT_UPSCALE_REPOSITORY);
    }

    #[test]
    fn unknown_method_keeps_default_scheduler() {
        let models = ModelSelection::default();
        let (_dir, layout) = layout_with(&models);
        let settings = GenerationTaskSettings {
            method: "plms".into(),
            ..GenerationTaskSettings::default()
        };

        let spec = PipelineSpec::resolve(&settings, &device(24), &models, &layout).unwrap();
        assert_eq!(spec.scheduler, None);
        assert!(spec.snapshot_path.ends_with("c0ffee"));
    }
}
