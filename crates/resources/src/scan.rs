//! Local size scans. Read-only, so they may run while a download writes
//! into the same snapshot.

use std::fs;
use std::path::Path;

use varnava_core::ignore::IgnorePatterns;
use varnava_core::snapshot::INCOMPLETE_SUFFIX;

use crate::hub::{partial_path, RepoFile};

/// Bytes present for the listed files, counting partial downloads.
pub(crate) fn listed_bytes(snapshot: &Path, files: &[RepoFile], ignore: &IgnorePatterns) -> u64 {
    files
        .iter()
        .filter(|file| !ignore.is_ignored(&file.rfilename))
        .map(|file| {
            let path = snapshot.join(&file.rfilename);
            file_len(&path)
                .or_else(|| file_len(&partial_path(&path)))
                .unwrap_or(0)
        })
        .sum()
}

/// Bytes of every non-ignored file below `snapshot`, used when the remote
/// listing is not known.
pub(crate) fn directory_bytes(snapshot: &Path, ignore: &IgnorePatterns) -> u64 {
    let mut total = 0;
    let mut pending = vec![snapshot.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            // Follows symlinks into the blob store.
            let Ok(meta) = fs::metadata(&path) else {
                continue;
            };
            if meta.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(relative) = path.strip_prefix(snapshot) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            let name = relative.strip_suffix(INCOMPLETE_SUFFIX).unwrap_or(&relative);
            if !ignore.is_ignored(name) {
                total += meta.len();
            }
        }
    }
    total
}

fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}
