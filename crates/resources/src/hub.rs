//! Remote model repositories.
//!
//! [`HfHub`] speaks the HuggingFace hub HTTP API:
//!
//! - metadata: `GET {endpoint}/api/models/{repo}/revision/{revision}?blobs=true`
//! - files: `GET {endpoint}/{repo}/resolve/{commit}/{filename}`
//!
//! Files are streamed into `<destination>.incomplete` and renamed once
//! complete. An existing partial file is resumed with a `Range` request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RANGE};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use varnava_core::ignore::IgnorePatterns;
use varnava_core::snapshot::INCOMPLETE_SUFFIX;

use crate::error::HubError;

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Metadata calls are short. File transfers have no overall timeout.
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    /// Path relative to the repository root.
    pub rfilename: String,
    /// Size in bytes, LFS size when the file is stored in LFS.
    pub size: Option<u64>,
}

/// A repository revision resolved to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub sha: String,
    pub siblings: Vec<RepoFile>,
}

impl RepoInfo {
    /// Files that are not excluded by `ignore`.
    pub fn files<'a>(&'a self, ignore: &'a IgnorePatterns) -> impl Iterator<Item = &'a RepoFile> {
        self.siblings
            .iter()
            .filter(|file| !ignore.is_ignored(&file.rfilename))
    }

    pub fn total_bytes(&self, ignore: &IgnorePatterns) -> u64 {
        self.files(ignore).filter_map(|file| file.size).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Bytes transferred in this call.
    Downloaded(u64),
    /// The remote had nothing left to send.
    AlreadyPresent,
    /// Stopped on cancellation; the partial file is kept for resuming.
    Cancelled,
}

#[async_trait]
pub trait ModelHub: Send + Sync {
    async fn repo_info(&self, repository: &str, revision: &str) -> Result<RepoInfo, HubError>;

    async fn download_file(
        &self,
        repository: &str,
        commit: &str,
        filename: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome, HubError>;
}

// ---------------------------------------------------------------------------
// HfHub
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiRepoInfo {
    sha: String,
    #[serde(default)]
    siblings: Vec<ApiSibling>,
}

#[derive(Debug, Deserialize)]
struct ApiSibling {
    rfilename: String,
    size: Option<u64>,
    lfs: Option<ApiLfs>,
}

#[derive(Debug, Deserialize)]
struct ApiLfs {
    size: Option<u64>,
}

impl From<ApiRepoInfo> for RepoInfo {
    fn from(api: ApiRepoInfo) -> Self {
        Self {
            sha: api.sha,
            siblings: api
                .siblings
                .into_iter()
                .map(|sibling| RepoFile {
                    size: sibling.lfs.and_then(|lfs| lfs.size).or(sibling.size),
                    rfilename: sibling.rfilename,
                })
                .collect(),
        }
    }
}

pub struct HfHub {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HfHub {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, HubError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("varnava/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }
}

#[async_trait]
impl ModelHub for HfHub {
    async fn repo_info(&self, repository: &str, revision: &str) -> Result<RepoInfo, HubError> {
        let url = format!(
            "{}/api/models/{repository}/revision/{revision}?blobs=true",
            self.endpoint
        );
        let response = self.get(&url).timeout(METADATA_TIMEOUT).send().await?;
        if !response.status().is_success() {
            return Err(HubError::Status {
                status: response.status().as_u16(),
                url,
            });
        }
        Ok(response.json::<ApiRepoInfo>().await?.into())
    }

    async fn download_file(
        &self,
        repository: &str,
        commit: &str,
        filename: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome, HubError> {
        let url = format!("{}/{repository}/resolve/{commit}/{filename}", self.endpoint);
        let partial = partial_path(destination);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let offset = tokio::fs::metadata(&partial)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);
        let mut request = self.get(&url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let mut response = request.send().await?;

        let append = match response.status() {
            StatusCode::RANGE_NOT_SATISFIABLE => {
                tokio::fs::rename(&partial, destination).await?;
                return Ok(FileOutcome::AlreadyPresent);
            }
            StatusCode::PARTIAL_CONTENT => true,
            status if status.is_success() => false,
            status => {
                return Err(HubError::Status {
                    status: status.as_u16(),
                    url,
                })
            }
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&partial)
            .await?;

        let mut written = 0u64;
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => {
                    file.flush().await?;
                    tracing::debug!(file = filename, written, "Download cancelled");
                    return Ok(FileOutcome::Cancelled);
                }
                chunk = response.chunk() => chunk?,
            };
            let Some(chunk) = chunk else { break };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, destination).await?;
        Ok(FileOutcome::Downloaded(written))
    }
}

/// `<destination>.incomplete`.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(INCOMPLETE_SUFFIX);
    PathBuf::from(name)
}
