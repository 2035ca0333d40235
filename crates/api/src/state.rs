use std::path::PathBuf;
use std::sync::Arc;

use varnava_core::device::DeviceProfile;
use varnava_events::UpdateChannel;
use varnava_resources::ResourceManager;
use varnava_worker::{GenerationWorker, TaskObserver};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Built once at startup (see [`crate::startup`]). Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: varnava_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Update channel to the connected desktop client.
    pub channel: Arc<UpdateChannel>,
    pub resources: Arc<ResourceManager>,
    pub worker: Arc<GenerationWorker>,
    /// Observer attached to every submitted task.
    pub progress: Arc<dyn TaskObserver>,
    /// Device reported by the synthesis service.
    pub device: DeviceProfile,
    /// Output images are stored under this directory.
    pub outputs_dir: Arc<PathBuf>,
}
