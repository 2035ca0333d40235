//! Cheap latent-to-RGB approximation for progress previews.
//!
//! Each pixel is a fixed linear mix of the four latent channels, rescaled
//! from `-1..1` to `0..255`. The result is lossy and only ever used for
//! previews; final images come from the pipeline itself.

use image::{Rgb, RgbImage};

use crate::error::PipelineError;
use crate::pipeline::{Latent, PipelineDescriptor};

/// Rows are latent channels, columns are R, G, B.
pub const LATENT_RGB_FACTORS: [[f32; 3]; 4] = [
    [0.298, 0.207, 0.208],
    [0.187, 0.286, 0.173],
    [-0.158, 0.189, 0.264],
    [-0.184, -0.271, -0.473],
];

#[derive(Debug, Clone)]
pub struct ApproximateDecoder {
    factors: [[f32; 3]; 4],
}

impl Default for ApproximateDecoder {
    fn default() -> Self {
        Self {
            factors: LATENT_RGB_FACTORS,
        }
    }
}

impl ApproximateDecoder {
    /// A decoder for pipelines with four latent channels, `None` otherwise.
    pub fn for_pipeline(descriptor: &PipelineDescriptor) -> Option<Self> {
        (descriptor.latent_channels == LATENT_RGB_FACTORS.len()).then(Self::default)
    }

    pub fn decode(&self, latent: &Latent) -> Result<RgbImage, PipelineError> {
        if latent.channels != self.factors.len() || !latent.is_consistent() {
            return Err(PipelineError::Decode(format!(
                "expected a {}-channel latent, got {} channels with {} values",
                self.factors.len(),
                latent.channels,
                latent.data.len()
            )));
        }
        let width = u32::try_from(latent.width).map_err(|e| PipelineError::Decode(e.to_string()))?;
        let height =
            u32::try_from(latent.height).map_err(|e| PipelineError::Decode(e.to_string()))?;

        Ok(RgbImage::from_fn(width, height, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let mut rgb = [0.0f32; 3];
            for (channel, row) in self.factors.iter().enumerate() {
                let value = latent.get(channel, y, x);
                for (out, factor) in rgb.iter_mut().zip(row) {
                    *out += value * factor;
                }
            }
            Rgb(rgb.map(to_byte))
        }))
    }
}

fn to_byte(value: f32) -> u8 {
    (((value + 1.0) / 2.0).clamp(0.0, 1.0) * 255.0) as u8
}
