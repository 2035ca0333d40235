use std::path::PathBuf;

use varnava_pipeline::PipelineError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker thread is gone and no longer accepts tasks.
    #[error("Generation worker is not running")]
    Stopped,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),

    /// The pipeline for the task could not be loaded.
    #[error("Failed to load pipeline: {0}")]
    Load(PipelineError),

    #[error("No pipeline is loaded")]
    NotLoaded,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Pipeline returned {actual} images for {expected} outputs")]
    ImageCount { expected: usize, actual: usize },

    #[error("Failed to write {}: {source}", path.display())]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Generation panicked: {0}")]
    Panicked(String),
}

impl WorkerError {
    /// Errors after which the resident pipeline must not be reused.
    pub fn invalidates_pipeline(&self) -> bool {
        matches!(self, Self::Load(_) | Self::NotLoaded | Self::Panicked(_))
    }
}
