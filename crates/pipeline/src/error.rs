use varnava_core::settings::JobKind;

/// Errors raised while building or running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The weights are not in the local model cache. Pipelines are never
    /// built from the network.
    #[error("Model weights for {repository}@{revision} are not in the local cache")]
    MissingWeights { repository: String, revision: String },

    #[error("A {0} job needs a source image")]
    MissingSourceImage(JobKind),

    /// The synthesis service answered with a non-2xx status.
    #[error("Synthesis service error ({status}): {body}")]
    Service { status: u16, body: String },

    /// The synthesis service reported a failure while generating.
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Synthesis service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed pipeline data: {0}")]
    Decode(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Configuration errors will fail again until the user acts, e.g. by
    /// downloading the model.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingWeights { .. } | Self::MissingSourceImage(_))
    }
}
