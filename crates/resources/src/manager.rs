//! Tracked models, local/remote size scans and the background download.
//!
//! At most one download run is active per manager. A run fetches every
//! tracked model in order; a failing model is recorded in the failure map
//! and the run moves on to the next one. While a run is active a polling
//! task rescans the local snapshots every [`POLL_INTERVAL`] and notifies the
//! [`ResourceObserver`], stopping once the run is over.
//!
//! Byte counters are plain fields behind a lock that is never held across a
//! transfer, so status reads may see a slightly stale snapshot.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use varnava_core::ignore::IgnorePatterns;
use varnava_core::remote_model::{ModelKind, RemoteModel};
use varnava_core::snapshot::SnapshotLayout;

use crate::config::{ConfigStore, ResourceConfig};
use crate::error::{HubError, ResourceError};
use crate::hub::{FileOutcome, ModelHub, RepoInfo};
use crate::scan;

/// How often local progress is rescanned while downloading.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Status types
// ---------------------------------------------------------------------------

/// Notified with a fresh status while a download run is active.
pub trait ResourceObserver: Send + Sync {
    fn on_resources_update(&self, status: &ResourceStatus);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadFailure {
    pub message: String,
    /// Retrying with the next manual start may succeed.
    pub transient: bool,
}

/// One tracked model as shown to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEntry {
    pub name: String,
    pub path: String,
    pub revision: String,
    pub kind: ModelKind,
    /// The model the worker uses for its kind.
    pub is_required: bool,
    pub downloaded_file_bytes: u64,
    pub total_file_bytes: u64,
}

/// Key names follow the desktop client: the model lists keep their record
/// names, everything else is camelCase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub resources: Vec<ResourceEntry>,
    #[serde(rename = "preview_models")]
    pub preview_models: Vec<RemoteModel>,
    #[serde(rename = "upscale_models")]
    pub upscale_models: Vec<RemoteModel>,
    pub is_downloading: bool,
    /// Repository currently being fetched.
    pub downloading_path: Option<String>,
    pub data_path: PathBuf,
    pub is_data_path_default: bool,
    pub failures: BTreeMap<String, DownloadFailure>,
}

// ---------------------------------------------------------------------------
// ResourceManager
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DownloadState {
    /// Id and cancellation token of the active run.
    run: Option<(u64, CancellationToken)>,
    next_run: u64,
    current: Option<String>,
    /// The most recent run, possibly still winding down after a stop.
    handle: Option<JoinHandle<()>>,
}

pub struct ResourceManager {
    hub: Arc<dyn ModelHub>,
    store: ConfigStore,
    layout: SnapshotLayout,
    ignore: IgnorePatterns,
    poll_interval: Duration,
    observer: Option<Arc<dyn ResourceObserver>>,
    config: RwLock<ResourceConfig>,
    repo_info: RwLock<HashMap<String, RepoInfo>>,
    failures: Mutex<BTreeMap<String, DownloadFailure>>,
    download: Mutex<DownloadState>,
}

impl ResourceManager {
    /// The models directory is fixed for the lifetime of the manager; a
    /// later data root change applies on the next start.
    pub fn new(hub: Arc<dyn ModelHub>, store: ConfigStore, config: ResourceConfig) -> Self {
        Self {
            hub,
            store,
            layout: SnapshotLayout::new(config.models_dir()),
            ignore: IgnorePatterns::default(),
            poll_interval: POLL_INTERVAL,
            observer: None,
            config: RwLock::new(config),
            repo_info: RwLock::new(HashMap::new()),
            failures: Mutex::new(BTreeMap::new()),
            download: Mutex::new(DownloadState::default()),
        }
    }

    pub fn with_ignore_patterns(mut self, ignore: IgnorePatterns) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ResourceObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn layout(&self) -> &SnapshotLayout {
        &self.layout
    }

    pub fn models_dir(&self) -> &Path {
        self.layout.models_dir()
    }

    /// A copy of the current configuration record.
    pub async fn config(&self) -> ResourceConfig {
        self.config.read().await.clone()
    }

    pub fn is_downloading(&self) -> bool {
        self.download_state().run.is_some()
    }

    pub fn downloading_path(&self) -> Option<String> {
        self.download_state().current.clone()
    }

    // ---- scans ----

    /// Size every tracked model from its remote listing.
    ///
    /// All models are attempted. On failure the affected models keep their
    /// previous totals and the first error is returned.
    pub async fn fetch_remote_information(&self) -> Result<(), ResourceError> {
        let mut first_error = None;
        for (repository, revision) in self.targets().await {
            match self.hub.repo_info(&repository, &revision).await {
                Ok(info) => {
                    let total = info.total_bytes(&self.ignore);
                    self.repo_info.write().await.insert(repository.clone(), info);
                    if let Some(model) = self.config.write().await.find_mut(&repository) {
                        model.total_file_bytes = total;
                    }
                    tracing::debug!(repository = %repository, total, "Fetched remote model size");
                }
                Err(e) => {
                    tracing::warn!(
                        repository = %repository,
                        error = %e,
                        transient = e.is_transient(),
                        "Failed to fetch remote model information"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Recount the bytes present locally for every tracked model.
    pub async fn fetch_local_information(&self) {
        let targets = self.targets().await;
        let infos = self.repo_info.read().await.clone();
        let layout = self.layout.clone();
        let ignore = self.ignore.clone();

        let scanned = tokio::task::spawn_blocking(move || {
            targets
                .into_iter()
                .map(|(repository, revision)| {
                    let bytes = match infos.get(&repository) {
                        Some(info) => scan::listed_bytes(
                            &layout.snapshot_dir(&repository, &info.sha),
                            &info.siblings,
                            &ignore,
                        ),
                        None => layout
                            .resolve_snapshot(&repository, &revision)
                            .map(|dir| scan::directory_bytes(&dir, &ignore))
                            .unwrap_or(0),
                    };
                    (repository, bytes)
                })
                .collect::<Vec<_>>()
        })
        .await;

        let scanned = match scanned {
            Ok(scanned) => scanned,
            Err(e) => {
                tracing::error!(error = %e, "Local model scan failed");
                return;
            }
        };
        let mut config = self.config.write().await;
        for (repository, bytes) in scanned {
            if let Some(model) = config.find_mut(&repository) {
                model.downloaded_file_bytes = bytes;
            }
        }
    }

    /// Remote then local scan. Remote failures are logged and otherwise
    /// ignored.
    pub async fn refresh(&self) {
        if let Err(e) = self.fetch_remote_information().await {
            tracing::debug!(error = %e, "Remote refresh incomplete");
        }
        self.fetch_local_information().await;
    }

    // ---- downloading ----

    /// Start a download run. Returns `false` if one is already active.
    pub fn start_downloading(self: &Arc<Self>) -> bool {
        let (run_id, token, previous) = {
            let mut state = self.download_state();
            if state.run.is_some() {
                tracing::debug!("Download already in progress");
                return false;
            }
            let run_id = state.next_run;
            state.next_run += 1;
            let token = CancellationToken::new();
            state.run = Some((run_id, token.clone()));
            (run_id, token, state.handle.take())
        };
        tracing::info!(run_id, "Starting model downloads");

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            // A stopped run may still be finishing a file write.
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            manager.download_all(&token).await;
            manager.finish_run(run_id);
        });
        self.download_state().handle = Some(handle);

        let manager = self.clone();
        tokio::spawn(async move { manager.poll_progress(run_id).await });
        true
    }

    /// Cancel the active run. Returns `false` if none was active. The
    /// transfer stops at its next chunk boundary.
    pub fn stop_downloading(&self) -> bool {
        let mut state = self.download_state();
        match state.run.take() {
            Some((run_id, token)) => {
                token.cancel();
                state.current = None;
                tracing::info!(run_id, "Stopping model downloads");
                true
            }
            None => false,
        }
    }

    async fn download_all(&self, token: &CancellationToken) {
        let models: Vec<RemoteModel> = self
            .config
            .read()
            .await
            .all()
            .map(|(_, model)| model.clone())
            .collect();

        for model in models {
            if token.is_cancelled() {
                break;
            }
            let repository = model.repository_path.clone();
            self.set_current(token, Some(repository.clone()));
            tracing::info!(repository = %repository, revision = %model.revision, "Downloading model");

            match self.download_model(&model, token).await {
                Ok(true) => {
                    tracing::info!(repository = %repository, "Model downloaded");
                    self.failures_map().remove(&repository);
                }
                Ok(false) => {
                    tracing::info!(repository = %repository, "Model download cancelled");
                }
                Err(e) => {
                    tracing::warn!(
                        repository = %repository,
                        error = %e,
                        transient = e.is_transient(),
                        "Model download failed"
                    );
                    self.failures_map().insert(
                        repository,
                        DownloadFailure {
                            message: e.to_string(),
                            transient: e.is_transient(),
                        },
                    );
                }
            }
        }
        self.set_current(token, None);
        self.fetch_local_information().await;
        tracing::info!("Model downloads finished");
    }

    /// Fetch the missing files of one model. Returns `false` if cancelled.
    async fn download_model(
        &self,
        model: &RemoteModel,
        token: &CancellationToken,
    ) -> Result<bool, HubError> {
        let repository = &model.repository_path;
        let cached = self.repo_info.read().await.get(repository).cloned();
        let info = match cached {
            Some(info) => info,
            None => {
                let info = self.hub.repo_info(repository, &model.revision).await?;
                self.repo_info
                    .write()
                    .await
                    .insert(repository.clone(), info.clone());
                info
            }
        };

        self.layout
            .record_commit(repository, &model.revision, &info.sha)?;
        let snapshot = self.layout.snapshot_dir(repository, &info.sha);

        for file in info.files(&self.ignore) {
            if token.is_cancelled() {
                return Ok(false);
            }
            let destination = snapshot.join(&file.rfilename);
            if is_complete(&destination, file.size) {
                continue;
            }
            match self
                .hub
                .download_file(repository, &info.sha, &file.rfilename, &destination, token)
                .await?
            {
                FileOutcome::Downloaded(bytes) => {
                    tracing::debug!(repository = %repository, file = %file.rfilename, bytes, "Downloaded file");
                }
                FileOutcome::AlreadyPresent => {}
                FileOutcome::Cancelled => return Ok(false),
            }
        }
        Ok(true)
    }

    async fn poll_progress(&self, run_id: u64) {
        let mut interval = tokio::time::interval(self.poll_interval);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.fetch_local_information().await;
            self.notify().await;
            if !self.is_run_active(run_id) {
                break;
            }
        }
        tracing::debug!(run_id, "Download progress polling stopped");
    }

    fn finish_run(&self, run_id: u64) {
        let mut state = self.download_state();
        if state.run.as_ref().is_some_and(|(id, _)| *id == run_id) {
            state.run = None;
            state.current = None;
        }
    }

    fn is_run_active(&self, run_id: u64) -> bool {
        self.download_state()
            .run
            .as_ref()
            .is_some_and(|(id, _)| *id == run_id)
    }

    fn set_current(&self, token: &CancellationToken, repository: Option<String>) {
        if token.is_cancelled() {
            return;
        }
        let mut state = self.download_state();
        if state.run.is_some() {
            state.current = repository;
        }
    }

    // ---- configuration ----

    /// Track a new preview or upscale model. The repository must resolve on
    /// the hub.
    pub async fn add_model(
        &self,
        kind: ModelKind,
        repository: &str,
        revision: Option<&str>,
    ) -> Result<RemoteModel, ResourceError> {
        let repository = repository.trim();
        if !kind.is_user_managed() {
            return Err(ResourceError::FixedModel(repository.to_string()));
        }
        if repository.is_empty() {
            return Err(ResourceError::InvalidModel {
                repository: repository.to_string(),
                reason: "empty repository identifier".to_string(),
            });
        }
        if self.config.read().await.is_tracked(repository) {
            return Err(ResourceError::AlreadyTracked(repository.to_string()));
        }

        let mut model = RemoteModel::new(repository, revision);
        let info = self
            .hub
            .repo_info(repository, &model.revision)
            .await
            .map_err(|e| {
                if e.is_transient() {
                    ResourceError::Hub(e)
                } else {
                    ResourceError::InvalidModel {
                        repository: repository.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;
        model.total_file_bytes = info.total_bytes(&self.ignore);
        self.repo_info
            .write()
            .await
            .insert(repository.to_string(), info);

        {
            let mut config = self.config.write().await;
            if config.is_tracked(repository) {
                return Err(ResourceError::AlreadyTracked(repository.to_string()));
            }
            config.models_mut(kind).push(model.clone());
            self.store.save(&config)?;
        }
        tracing::info!(repository = %repository, kind = %kind, "Model added");

        self.fetch_local_information().await;
        Ok(self
            .config
            .read()
            .await
            .find(repository)
            .cloned()
            .unwrap_or(model))
    }

    /// Stop tracking a model and delete its local files. The variation model
    /// stays.
    pub async fn remove_model(&self, repository: &str) -> Result<RemoteModel, ResourceError> {
        let removed = {
            let mut config = self.config.write().await;
            if config
                .all()
                .any(|(kind, model)| !kind.is_user_managed() && model.repository_path == repository)
            {
                return Err(ResourceError::FixedModel(repository.to_string()));
            }
            let mut removed = None;
            for kind in [ModelKind::Preview, ModelKind::Upscale] {
                let models = config.models_mut(kind);
                if let Some(index) = models
                    .iter()
                    .position(|model| model.repository_path == repository)
                {
                    removed = Some(models.remove(index));
                    break;
                }
            }
            let removed =
                removed.ok_or_else(|| ResourceError::NotTracked(repository.to_string()))?;
            self.store.save(&config)?;
            removed
        };

        self.repo_info.write().await.remove(repository);
        self.failures_map().remove(repository);

        let dir = self.layout.repo_dir(repository);
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tracing::info!(repository = %repository, "Model removed");
        Ok(removed)
    }

    /// Persist a new data root. The directory must exist.
    pub async fn set_data_root(&self, path: PathBuf) -> Result<(), ResourceError> {
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| ResourceError::PathNotFound(path.clone()))?;
        if !meta.is_dir() {
            return Err(ResourceError::PathNotDirectory(path));
        }

        let mut config = self.config.write().await;
        config.data_root_path = path;
        self.store.save(&config)?;
        tracing::info!(path = %config.data_root_path.display(), "Data root updated");
        Ok(())
    }

    // ---- status ----

    pub async fn status(&self) -> ResourceStatus {
        let config = self.config.read().await.clone();
        let (is_downloading, downloading_path) = {
            let state = self.download_state();
            (state.run.is_some(), state.current.clone())
        };

        let resources = config
            .all()
            .map(|(kind, model)| ResourceEntry {
                name: model.name.clone(),
                path: model.repository_path.clone(),
                revision: model.revision.clone(),
                kind,
                is_required: config
                    .active(kind)
                    .is_some_and(|active| active.repository_path == model.repository_path),
                downloaded_file_bytes: model.downloaded_file_bytes,
                total_file_bytes: model.total_file_bytes,
            })
            .collect();

        ResourceStatus {
            resources,
            is_data_path_default: config.data_root_path.as_path() == self.store.default_data_root(),
            data_path: config.data_root_path,
            preview_models: config.preview_models,
            upscale_models: config.upscale_models,
            is_downloading,
            downloading_path,
            failures: self.failures_map().clone(),
        }
    }

    pub async fn notify(&self) {
        if let Some(observer) = &self.observer {
            let status = self.status().await;
            observer.on_resources_update(&status);
        }
    }

    // ---- private helpers ----

    async fn targets(&self) -> Vec<(String, String)> {
        self.config
            .read()
            .await
            .all()
            .map(|(_, model)| (model.repository_path.clone(), model.revision.clone()))
            .collect()
    }

    fn download_state(&self) -> MutexGuard<'_, DownloadState> {
        self.download
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn failures_map(&self) -> MutexGuard<'_, BTreeMap<String, DownloadFailure>> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn is_complete(path: &Path, expected: Option<u64>) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && expected.map_or(true, |size| meta.len() == size),
        Err(_) => false,
    }
}
