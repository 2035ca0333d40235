use std::path::PathBuf;

/// Failures talking to the model hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Hub request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Hub returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    /// Whether retrying later may succeed. Network trouble, timeouts, rate
    /// limiting and server errors are transient; missing repositories,
    /// authorization failures and local disk errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_body() || e.is_request(),
            Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Io(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Model {0} is already tracked")]
    AlreadyTracked(String),

    #[error("Model {0} is not tracked")]
    NotTracked(String),

    /// Built-in models cannot be added or removed.
    #[error("Model {0} is built in")]
    FixedModel(String),

    /// The repository could not be resolved on the hub.
    #[error("Invalid model {repository}: {reason}")]
    InvalidModel { repository: String, reason: String },

    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Path is not a directory: {}", .0.display())]
    PathNotDirectory(PathBuf),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let status = |status| HubError::Status {
            status,
            url: "https://hub.test/x".to_string(),
        };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(401).is_transient());
        assert!(!HubError::Io(std::io::Error::other("disk full")).is_transient());
    }
}
