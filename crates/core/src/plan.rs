//! Derived execution parameters for one task.
//!
//! The worker turns [`GenerationTaskSettings`] into an [`ExecutionPlan`]
//! right before invoking the pipeline. The seed is resolved exactly once per
//! task so every progress report carries the same value.

use serde::Serialize;

use crate::device::DeviceProfile;
use crate::settings::{GenerationTaskSettings, JobKind};

/// `guidance = strength * GUIDANCE_SCALE_FACTOR`.
pub const GUIDANCE_SCALE_FACTOR: f64 = 12.5;

/// Fixed step count for upscale jobs.
pub const UPSCALE_STEPS: u32 = 75;

/// Fixed step count for variation jobs.
pub const VARIATION_STEPS: u32 = 50;

/// Upscale sources are fed at `dimension / UPSCALE_SOURCE_DIVISOR * UPSCALE_SOURCE_UNIT`.
const UPSCALE_SOURCE_DIVISOR: u32 = 512;
const UPSCALE_SOURCE_UNIT: u32 = 128;

/// Smallest upscale target that still yields a non-empty source image.
pub const MIN_UPSCALE_DIMENSION: u32 = UPSCALE_SOURCE_DIVISOR;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f64,
    pub seed: u64,
    /// Square edge the upscale source is resized to. `None` for other kinds.
    pub source_dimension: Option<u32>,
}

impl ExecutionPlan {
    /// Build a plan, drawing a seed from `draw_seed` only when the settings
    /// do not carry an explicit one.
    pub fn resolve(
        settings: &GenerationTaskSettings,
        device: &DeviceProfile,
        draw_seed: impl FnOnce() -> u64,
    ) -> Self {
        let (width, height) = scaled_dimensions(device.base_dimension(), settings.dimensions);

        let steps = match settings.kind {
            JobKind::Preview => settings.steps.max(1),
            JobKind::Upscale => UPSCALE_STEPS,
            JobKind::Variation => VARIATION_STEPS,
        };

        let source_dimension = (settings.kind == JobKind::Upscale).then(|| {
            settings.upscale.dimension / UPSCALE_SOURCE_DIVISOR * UPSCALE_SOURCE_UNIT
        });

        Self {
            width,
            height,
            steps,
            guidance_scale: settings.strength * GUIDANCE_SCALE_FACTOR,
            seed: settings.explicit_seed().unwrap_or_else(draw_seed),
            source_dimension,
        }
    }
}

/// Shrink the axis on the non-unit side of `aspect` (width / height).
pub fn scaled_dimensions(base: u32, aspect: f64) -> (u32, u32) {
    if !aspect.is_finite() || aspect <= 0.0 {
        return (base, base);
    }
    let base_f = f64::from(base);
    if aspect < 1.0 {
        ((base_f * aspect).round() as u32, base)
    } else if aspect > 1.0 {
        (base, (base_f / aspect).round() as u32)
    } else {
        (base, base)
    }
}

/// Draw a fresh seed. Kept within `u32` so it survives a JSON round trip
/// through the desktop client.
pub fn random_seed() -> u64 {
    u64::from(rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceKind;

    fn cuda() -> DeviceProfile {
        DeviceProfile {
            kind: DeviceKind::Cuda,
            total_memory_bytes: 24 * 1024 * 1024 * 1024,
        }
    }

    #[test]
    fn portrait_aspect_shrinks_width() {
        assert_eq!(scaled_dimensions(768, 0.5), (384, 768));
        assert_eq!(scaled_dimensions(768, 0.75), (576, 768));
    }

    #[test]
    fn landscape_aspect_shrinks_height() {
        assert_eq!(scaled_dimensions(768, 2.0), (768, 384));
        assert_eq!(scaled_dimensions(512, 1.5), (512, 341));
    }

    #[test]
    fn degenerate_aspect_keeps_square() {
        assert_eq!(scaled_dimensions(768, 1.0), (768, 768));
        assert_eq!(scaled_dimensions(768, 0.0), (768, 768));
        assert_eq!(scaled_dimensions(768, f64::NAN), (768, 768));
    }

    #[test]
    fn explicit_seed_skips_the_draw() {
        let settings = GenerationTaskSettings {
            seed: 99,
            ..GenerationTaskSettings::default()
        };
        let plan = ExecutionPlan::resolve(&settings, &cuda(), || panic!("must not draw"));
        assert_eq!(plan.seed, 99);
    }

    #[test]
    fn auto_seed_uses_the_draw() {
        let plan = ExecutionPlan::resolve(&GenerationTaskSettings::default(), &cuda(), || 7);
        assert_eq!(plan.seed, 7);
    }

    #[test]
    fn kind_specific_steps_override_settings() {
        let preview = GenerationTaskSettings {
            steps: 12,
            ..GenerationTaskSettings::default()
        };
        let upscale = GenerationTaskSettings {
            kind: JobKind::Upscale,
            ..preview.clone()
        };
        let variation = GenerationTaskSettings {
            kind: JobKind::Variation,
            ..preview.clone()
        };

        assert_eq!(ExecutionPlan::resolve(&preview, &cuda(), || 0).steps, 12);
        assert_eq!(ExecutionPlan::resolve(&upscale, &cuda(), || 0).steps, UPSCALE_STEPS);
        assert_eq!(ExecutionPlan::resolve(&variation, &cuda(), || 0).steps, VARIATION_STEPS);
    }

    #[test]
    fn guidance_is_linear_in_strength() {
        let settings = GenerationTaskSettings {
            strength: 0.6,
            ..GenerationTaskSettings::default()
        };
        let plan = ExecutionPlan::resolve(&settings, &cuda(), || 0);
        assert!((plan.guidance_scale - 7.5).abs() < 1e-9);
    }

    #[test]
    fn upscale_source_dimension_is_quantized() {
        let settings = GenerationTaskSettings {
            kind: JobKind::Upscale,
            ..GenerationTaskSettings::default()
        };
        let plan = ExecutionPlan::resolve(&settings, &cuda(), || 0);
        assert_eq!(plan.source_dimension, Some(256));

        let preview = ExecutionPlan::resolve(&GenerationTaskSettings::default(), &cuda(), || 0);
        assert_eq!(preview.source_dimension, None);
    }
}
