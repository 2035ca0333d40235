//! Model resource management.
//!
//! - [`ModelHub`] is the remote side: repository metadata and file
//!   transfer. [`HfHub`] implements it against a HuggingFace-compatible API.
//! - [`ResourceManager`] tracks the configured models, compares remote and
//!   local sizes and drives one cancellable background download at a time.
//! - [`ConfigStore`] persists the tracked models and the data root.

pub mod config;
pub mod error;
pub mod hub;
pub mod manager;
mod scan;

pub use config::{ConfigStore, ResourceConfig};
pub use error::{ConfigError, HubError, ResourceError};
pub use hub::{FileOutcome, HfHub, ModelHub, RepoFile, RepoInfo};
pub use manager::{
    DownloadFailure, ResourceEntry, ResourceManager, ResourceObserver, ResourceStatus,
};
