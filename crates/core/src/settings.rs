//! Generation request settings as submitted by the desktop client.
//!
//! [`GenerationTaskSettings`] is deserialized straight from the request body,
//! so every field has a default and unknown fields are ignored. Only three of
//! its fields identify the pipeline that can serve a job; see
//! [`GenerationTaskSettings::is_structurally_equal`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::plan::MIN_UPSCALE_DIMENSION;

/// Seed value that asks the worker to draw a fresh random seed.
pub const AUTO_SEED: i64 = -1;

/// Default sampling method name.
pub const DEFAULT_METHOD: &str = "dpm";

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// What a task produces. Each kind is served by a different pipeline variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Text-to-image generation.
    #[default]
    Preview,
    /// Image super-resolution of an existing output.
    Upscale,
    /// Image-conditioned generation from an existing output.
    Variation,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Upscale => "upscale",
            Self::Variation => "variation",
        }
    }

    /// Whether this kind needs a source image to run.
    pub fn requires_source_image(&self) -> bool {
        matches!(self, Self::Upscale | Self::Variation)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SamplingMethod
// ---------------------------------------------------------------------------

/// The fixed set of samplers a pipeline can be switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingMethod {
    #[serde(rename = "dpm")]
    DpmMultistep,
    #[serde(rename = "ddim")]
    Ddim,
    #[serde(rename = "k-lms")]
    KLms,
    #[serde(rename = "heun")]
    Heun,
    #[serde(rename = "dpm-ss")]
    DpmSinglestep,
    #[serde(rename = "deis-ms")]
    DeisMultistep,
}

impl SamplingMethod {
    pub const ALL: [SamplingMethod; 6] = [
        Self::DpmMultistep,
        Self::Ddim,
        Self::KLms,
        Self::Heun,
        Self::DpmSinglestep,
        Self::DeisMultistep,
    ];

    /// Resolve a method name. Unknown names yield `None`, which callers treat
    /// as "keep the pipeline's default sampler".
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DpmMultistep => "dpm",
            Self::Ddim => "ddim",
            Self::KLms => "k-lms",
            Self::Heun => "heun",
            Self::DpmSinglestep => "dpm-ss",
            Self::DeisMultistep => "deis-ms",
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationTaskSettings
// ---------------------------------------------------------------------------

/// Settings specific to upscaling jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscaleSettings {
    /// Requested output edge length in pixels.
    pub dimension: u32,
}

impl Default for UpscaleSettings {
    fn default() -> Self {
        Self { dimension: 1024 }
    }
}

/// Immutable description of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationTaskSettings {
    /// Explicit seed, or [`AUTO_SEED`].
    pub seed: i64,
    /// Aspect ratio (width / height). `1.0` is square.
    pub dimensions: f64,
    /// Number of images produced together in one invocation.
    pub batch: u32,
    /// Sampling method name, see [`SamplingMethod`].
    pub method: String,
    /// Guidance strength knob in `0.0..=1.0`.
    pub strength: f64,
    /// Denoising step count for `preview` jobs.
    pub steps: u32,
    /// Seamless tiling flag, `0` or `1` on the wire.
    pub seamless: u8,
    #[serde(rename = "type")]
    pub kind: JobKind,
    /// Source image for image-conditioned kinds. Set by the server, never by
    /// the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_url: Option<PathBuf>,
    pub upscale: UpscaleSettings,
}

impl Default for GenerationTaskSettings {
    fn default() -> Self {
        Self {
            seed: AUTO_SEED,
            dimensions: 1.0,
            batch: 2,
            method: DEFAULT_METHOD.to_string(),
            strength: 0.6,
            steps: 30,
            seamless: 0,
            kind: JobKind::Preview,
            initial_url: None,
            upscale: UpscaleSettings::default(),
        }
    }
}

impl GenerationTaskSettings {
    /// Whether seamless tiling was requested.
    pub fn is_seamless(&self) -> bool {
        self.seamless != 0
    }

    /// The explicit seed, if one was given.
    pub fn explicit_seed(&self) -> Option<u64> {
        u64::try_from(self.seed).ok()
    }

    /// Two settings values can share a pipeline iff they agree on job kind,
    /// sampling method name and tiling flag. Prompt, seed, steps, strength,
    /// batch size and dimensions never matter.
    pub fn is_structurally_equal(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.method == other.method
            && self.is_seamless() == other.is_seamless()
    }

    /// Reject settings the worker could never execute.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.batch == 0 {
            return Err(CoreError::Validation("batch must be at least 1".into()));
        }
        if self.kind == JobKind::Upscale && self.upscale.dimension < MIN_UPSCALE_DIMENSION {
            return Err(CoreError::Validation(format!(
                "upscale dimension must be at least {MIN_UPSCALE_DIMENSION}, got {}",
                self.upscale.dimension
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_client_payload_with_defaults() {
        let settings: GenerationTaskSettings =
            serde_json::from_value(serde_json::json!({ "type": "upscale", "batch": 1 }))
                .unwrap();

        assert_eq!(settings.kind, JobKind::Upscale);
        assert_eq!(settings.batch, 1);
        assert_eq!(settings.seed, AUTO_SEED);
        assert_eq!(settings.method, "dpm");
        assert_eq!(settings.upscale.dimension, 1024);
        assert!(settings.initial_url.is_none());
    }

    #[test]
    fn structural_equality_ignores_non_pipeline_fields() {
        let a = GenerationTaskSettings::default();
        let b = GenerationTaskSettings {
            seed: 42,
            dimensions: 1.5,
            batch: 4,
            strength: 0.1,
            steps: 120,
            ..GenerationTaskSettings::default()
        };
        assert!(a.is_structurally_equal(&b));
        assert!(b.is_structurally_equal(&a));
    }

    #[test]
    fn structural_equality_tracks_kind_method_and_tiling() {
        let base = GenerationTaskSettings::default();

        let other_kind = GenerationTaskSettings {
            kind: JobKind::Variation,
            ..base.clone()
        };
        let other_method = GenerationTaskSettings {
            method: "ddim".into(),
            ..base.clone()
        };
        let tiled = GenerationTaskSettings {
            seamless: 1,
            ..base.clone()
        };

        assert!(!base.is_structurally_equal(&other_kind));
        assert!(!base.is_structurally_equal(&other_method));
        assert!(!base.is_structurally_equal(&tiled));
    }

    #[test]
    fn unknown_method_names_do_not_parse() {
        assert_eq!(SamplingMethod::parse("heun"), Some(SamplingMethod::Heun));
        assert_eq!(SamplingMethod::parse("deis-ms"), Some(SamplingMethod::DeisMultistep));
        assert_eq!(SamplingMethod::parse("plms"), None);
        assert_eq!(SamplingMethod::parse(""), None);
    }

    #[test]
    fn validation_rejects_unrunnable_settings() {
        assert!(GenerationTaskSettings::default().validate().is_ok());

        let empty = GenerationTaskSettings {
            batch: 0,
            ..GenerationTaskSettings::default()
        };
        assert!(matches!(empty.validate(), Err(CoreError::Validation(_))));

        let tiny_upscale = GenerationTaskSettings {
            kind: JobKind::Upscale,
            upscale: UpscaleSettings { dimension: 300 },
            ..GenerationTaskSettings::default()
        };
        assert!(matches!(tiny_upscale.validate(), Err(CoreError::Validation(_))));

        // Only upscale jobs use the dimension.
        let tiny_preview = GenerationTaskSettings {
            upscale: UpscaleSettings { dimension: 300 },
            ..GenerationTaskSettings::default()
        };
        assert!(tiny_preview.validate().is_ok());

        let smallest = GenerationTaskSettings {
            kind: JobKind::Upscale,
            upscale: UpscaleSettings {
                dimension: MIN_UPSCALE_DIMENSION,
            },
            ..GenerationTaskSettings::default()
        };
        assert!(smallest.validate().is_ok());
    }

    #[test]
    fn negative_seed_is_not_explicit() {
        let auto = GenerationTaskSettings::default();
        let fixed = GenerationTaskSettings {
            seed: 1234,
            ..GenerationTaskSettings::default()
        };
        assert_eq!(auto.explicit_seed(), None);
        assert_eq!(fixed.explicit_seed(), Some(1234));
    }
}
