//! The persisted configuration record.
//!
//! Stored as pretty JSON at `<root>/config.json`:
//!
//! ```json
//! {
//!   "data_root_path": "/home/me/.local/share/varnava/data",
//!   "preview_models": [{ "name": "...", "repository_path": "...", ... }],
//!   "upscale_models": [...]
//! }
//! ```
//!
//! A missing or unreadable file yields the defaults. The whole record is
//! written after every mutation. The variation model is not part of the
//! file: it is always the built-in one.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use varnava_core::remote_model::{ModelKind, RemoteModel};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub data_root_path: PathBuf,
    #[serde(default)]
    pub preview_models: Vec<RemoteModel>,
    #[serde(default)]
    pub upscale_models: Vec<RemoteModel>,
    #[serde(skip, default = "default_variation_models")]
    pub variation_models: Vec<RemoteModel>,
}

fn default_variation_models() -> Vec<RemoteModel> {
    vec![RemoteModel::default_variation()]
}

impl ResourceConfig {
    /// One default model of each kind under `data_root_path`.
    pub fn with_defaults(data_root_path: impl Into<PathBuf>) -> Self {
        Self {
            data_root_path: data_root_path.into(),
            preview_models: vec![RemoteModel::default_preview()],
            upscale_models: vec![RemoteModel::default_upscale()],
            variation_models: default_variation_models(),
        }
    }

    pub fn models(&self, kind: ModelKind) -> &[RemoteModel] {
        match kind {
            ModelKind::Preview => &self.preview_models,
            ModelKind::Upscale => &self.upscale_models,
            ModelKind::Variation => &self.variation_models,
        }
    }

    pub fn models_mut(&mut self, kind: ModelKind) -> &mut Vec<RemoteModel> {
        match kind {
            ModelKind::Preview => &mut self.preview_models,
            ModelKind::Upscale => &mut self.upscale_models,
            ModelKind::Variation => &mut self.variation_models,
        }
    }

    /// Every tracked model in download order: previews, upscalers, then the
    /// variation model.
    pub fn all(&self) -> impl Iterator<Item = (ModelKind, &RemoteModel)> {
        self.preview_models
            .iter()
            .map(|model| (ModelKind::Preview, model))
            .chain(self.upscale_models.iter().map(|model| (ModelKind::Upscale, model)))
            .chain(
                self.variation_models
                    .iter()
                    .map(|model| (ModelKind::Variation, model)),
            )
    }

    pub fn find(&self, repository: &str) -> Option<&RemoteModel> {
        self.all()
            .map(|(_, model)| model)
            .find(|model| model.repository_path == repository)
    }

    pub fn find_mut(&mut self, repository: &str) -> Option<&mut RemoteModel> {
        self.preview_models
            .iter_mut()
            .chain(self.upscale_models.iter_mut())
            .chain(self.variation_models.iter_mut())
            .find(|model| model.repository_path == repository)
    }

    pub fn is_tracked(&self, repository: &str) -> bool {
        self.all().any(|(_, model)| model.repository_path == repository)
    }

    /// The model the worker uses for `kind`: the first one tracked.
    pub fn active(&self, kind: ModelKind) -> Option<&RemoteModel> {
        self.models(kind).first()
    }

    pub fn models_dir(&self) -> PathBuf {
        self.data_root_path.join("models")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.data_root_path.join("outputs")
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    default_data_root: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, default_data_root: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_data_root: default_data_root.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_data_root(&self) -> &Path {
        &self.default_data_root
    }

    /// Read the record. Never fails: problems are logged and the defaults
    /// returned instead.
    pub fn load(&self) -> ResourceConfig {
        match self.try_load() {
            Ok(Some(config)) => config,
            Ok(None) => ResourceConfig::with_defaults(&self.default_data_root),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unreadable config, using defaults"
                );
                ResourceConfig::with_defaults(&self.default_data_root)
            }
        }
    }

    fn try_load(&self) -> Result<Option<ResourceConfig>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Write the whole record, replacing the previous file atomically.
    pub fn save(&self, config: &ResourceConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_vec_pretty(config)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serialized)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"), dir.path().join("data"));

        let config = store.load();
        assert_eq!(config.data_root_path, dir.path().join("data"));
        assert_eq!(config.preview_models.len(), 1);
        assert_eq!(config.upscale_models.len(), 1);
        assert_eq!(
            config.active(ModelKind::Upscale).unwrap().repository_path,
            "stabilityai/stable-diffusion-x4-upscaler"
        );
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ not json").unwrap();

        let config = ConfigStore::new(&path, dir.path().join("data")).load();
        assert_eq!(config, ResourceConfig::with_defaults(dir.path().join("data")));
    }

    #[test]
    fn saved_record_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested/config.json"), dir.path());

        let mut config = ResourceConfig::with_defaults("/data");
        config.preview_models.push(RemoteModel::new("org/extra", None));
        store.save(&config).unwrap();

        assert_eq!(store.load(), config);
        assert!(!dir.path().join("nested/config.json.tmp").exists());
    }

    #[test]
    fn lookup_spans_every_kind() {
        let mut config = ResourceConfig::with_defaults("/data");
        assert!(config.is_tracked("stabilityai/stable-diffusion-x4-upscaler"));
        assert!(config.is_tracked("lambdalabs/sd-image-variations-diffusers"));
        assert!(config.find_mut("stabilityai/stable-diffusion-2-1").is_some());
        assert!(!config.is_tracked("org/unknown"));
        assert_eq!(config.all().count(), 3);
        assert_eq!(config.all().last().map(|(kind, _)| kind), Some(ModelKind::Variation));
    }

    #[test]
    fn variation_model_is_never_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::new(&path, dir.path());

        let mut config = ResourceConfig::with_defaults("/data");
        config.variation_models.clear();
        store.save(&config).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(raw.get("variation_models").is_none());
        assert_eq!(
            store.load().active(ModelKind::Variation).unwrap().repository_path,
            "lambdalabs/sd-image-variations-diffusers"
        );
    }
}
