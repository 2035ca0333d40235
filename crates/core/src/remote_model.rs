//! Descriptor of a downloadable model repository.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::DEFAULT_REVISION;

pub const DEFAULT_PREVIEW_REPOSITORY: &str = "stabilityai/stable-diffusion-2-1";
pub const DEFAULT_UPSCALE_REPOSITORY: &str = "stabilityai/stable-diffusion-x4-upscaler";
pub const DEFAULT_MODEL_REVISION: &str = "fp16";
pub const DEFAULT_VARIATION_REPOSITORY: &str = "lambdalabs/sd-image-variations-diffusers";
pub const DEFAULT_VARIATION_REVISION: &str = "v2.0";

/// Which list a tracked model belongs to. Variation models are fixed: they
/// are downloaded like the others but cannot be added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Preview,
    Upscale,
    Variation,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Upscale => "upscale",
            Self::Variation => "variation",
        }
    }

    /// Whether models of this kind can be added and removed by the user.
    pub fn is_user_managed(&self) -> bool {
        !matches!(self, Self::Variation)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteModel {
    pub name: String,
    pub repository_path: String,
    #[serde(default = "default_revision")]
    pub revision: String,
    #[serde(default)]
    pub downloaded_file_bytes: u64,
    #[serde(default)]
    pub total_file_bytes: u64,
}

fn default_revision() -> String {
    DEFAULT_REVISION.to_string()
}

impl RemoteModel {
    /// A model with unknown sizes. The display name is the last path segment
    /// of the repository identifier.
    pub fn new(repository_path: impl Into<String>, revision: Option<&str>) -> Self {
        let repository_path = repository_path.into();
        let name = repository_path
            .rsplit('/')
            .next()
            .unwrap_or(repository_path.as_str())
            .to_string();
        Self {
            name,
            repository_path,
            revision: revision.unwrap_or(DEFAULT_REVISION).to_string(),
            downloaded_file_bytes: 0,
            total_file_bytes: 0,
        }
    }

    pub fn default_preview() -> Self {
        Self::new(DEFAULT_PREVIEW_REPOSITORY, Some(DEFAULT_MODEL_REVISION))
    }

    pub fn default_upscale() -> Self {
        Self::new(DEFAULT_UPSCALE_REPOSITORY, Some(DEFAULT_MODEL_REVISION))
    }

    pub fn default_variation() -> Self {
        Self::new(DEFAULT_VARIATION_REPOSITORY, Some(DEFAULT_VARIATION_REVISION))
    }

    /// Sized remotely and every byte is present locally.
    pub fn is_downloaded(&self) -> bool {
        self.total_file_bytes > 0 && self.downloaded_file_bytes >= self.total_file_bytes
    }

    /// Download fraction in `0.0..=1.0`. Unsized models report `0.0`.
    pub fn progress(&self) -> f64 {
        if self.total_file_bytes == 0 {
            return 0.0;
        }
        (self.downloaded_file_bytes as f64 / self.total_file_bytes as f64).min(1.0)
    }
}
