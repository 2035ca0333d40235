use std::path::PathBuf;

use directories::ProjectDirs;

const DATABASE_FILE: &str = "data.db";
const CONFIG_FILE: &str = "config.json";
const DATA_DIR: &str = "data";

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running next to the desktop client.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `23804`).
    pub port: u16,
    /// Allowed CORS origins. `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Holds the database, the configuration record and the default data root.
    pub root_dir: PathBuf,
    /// Base URL of the synthesis service.
    pub synthesis_url: String,
    /// Model hub endpoint.
    pub hub_endpoint: String,
    /// Bearer token for gated repositories.
    pub hub_token: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                          |
    /// |-------------------------|----------------------------------|
    /// | `HOST`                  | `127.0.0.1`                      |
    /// | `VARNAVA_SERVER_PORT`   | `23804`                          |
    /// | `CORS_ORIGINS`          | `*`                              |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                             |
    /// | `VARNAVA_ROOT_DIR`      | platform data dir                |
    /// | `VARNAVA_SYNTHESIS_URL` | `http://127.0.0.1:5000`          |
    /// | `HF_ENDPOINT`           | `https://huggingface.co`         |
    /// | `HF_TOKEN`              | unset                            |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());

        let port: u16 = std::env::var("VARNAVA_SERVER_PORT")
            .unwrap_or_else(|_| "23804".into())
            .parse()
            .expect("VARNAVA_SERVER_PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let root_dir = std::env::var("VARNAVA_ROOT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_root_dir());

        let synthesis_url = std::env::var("VARNAVA_SYNTHESIS_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5000".into())
            .trim_end_matches('/')
            .to_string();

        let hub_endpoint = std::env::var("HF_ENDPOINT")
            .unwrap_or_else(|_| varnava_resources::hub::DEFAULT_ENDPOINT.into());

        let hub_token = std::env::var("HF_TOKEN").ok().filter(|t| !t.is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            root_dir,
            synthesis_url,
            hub_endpoint,
            hub_token,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_dir.join(DATABASE_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root_dir.join(CONFIG_FILE)
    }

    /// Data root used until the user picks another one.
    pub fn default_data_root(&self) -> PathBuf {
        self.root_dir.join(DATA_DIR)
    }
}

fn default_root_dir() -> PathBuf {
    ProjectDirs::from("com", "veralomna", "varnava")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".varnava"))
}
