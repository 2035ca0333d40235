//! On-disk layout of the local model cache.
//!
//! The layout is the one used by the HuggingFace hub cache, so weights that
//! were fetched by other tools are picked up as-is:
//!
//! ```text
//! <models_dir>/models--<org>--<name>/
//!     refs/<revision>              file holding the resolved commit hash
//!     snapshots/<commit>/<files>   materialized repository files
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Revision used when a model does not pin one.
pub const DEFAULT_REVISION: &str = "main";

/// Suffix of files that are still being downloaded.
pub const INCOMPLETE_SUFFIX: &str = ".incomplete";

#[derive(Debug, Clone)]
pub struct SnapshotLayout {
    models_dir: PathBuf,
}

impl SnapshotLayout {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// `org/name` becomes `models--org--name`.
    pub fn repo_folder_name(repository: &str) -> String {
        format!("models--{}", repository.replace('/', "--"))
    }

    pub fn repo_dir(&self, repository: &str) -> PathBuf {
        self.models_dir.join(Self::repo_folder_name(repository))
    }

    pub fn ref_path(&self, repository: &str, revision: &str) -> PathBuf {
        self.repo_dir(repository).join("refs").join(revision)
    }

    pub fn snapshot_dir(&self, repository: &str, commit: &str) -> PathBuf {
        self.repo_dir(repository).join("snapshots").join(commit)
    }

    /// Commit hash recorded locally for `revision`, if any.
    ///
    /// A revision that is itself a commit hash with a materialized snapshot
    /// resolves to itself.
    pub fn resolve_commit(&self, repository: &str, revision: &str) -> Option<String> {
        if let Ok(contents) = fs::read_to_string(self.ref_path(repository, revision)) {
            let commit = contents.trim();
            if !commit.is_empty() {
                return Some(commit.to_string());
            }
        }
        if is_commit_hash(revision) && self.snapshot_dir(repository, revision).is_dir() {
            return Some(revision.to_string());
        }
        None
    }

    /// Snapshot directory for `revision`, only if it exists on disk.
    pub fn resolve_snapshot(&self, repository: &str, revision: &str) -> Option<PathBuf> {
        let commit = self.resolve_commit(repository, revision)?;
        let dir = self.snapshot_dir(repository, &commit);
        dir.is_dir().then_some(dir)
    }

    /// Record the commit a revision currently points to.
    pub fn record_commit(&self, repository: &str, revision: &str, commit: &str) -> io::Result<()> {
        let path = self.ref_path(repository, revision);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, commit)
    }
}

fn is_commit_hash(value: &str) -> bool {
    value.len() == 40 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
