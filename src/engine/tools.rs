//! Path and time utilities

use anyhow::{Context, Result};
use std::fs::Metadata;
use std::path::{MAIN_SEPARATOR_STR, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Convert absolute path to relative path from base
pub fn path_relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Index of `path` under the scan `root`: the root prefix stripped, leading separator kept
/// (`/data` + `/data/x/a.txt` -> `/x/a.txt`). Paths outside `root` are returned unchanged.
pub fn relative_index(path: &Path, root: &Path) -> PathBuf {
    match path_relative_to(path, root) {
        Some(rel) => {
            let mut idx = PathBuf::from(MAIN_SEPARATOR_STR);
            idx.push(rel);
            idx
        }
        None => path.to_path_buf(),
    }
}

/// Key a path is stored under in the dedup cache.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Current wall clock in unix seconds.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Modification time in unix seconds (0 when unavailable or before the epoch).
pub fn mtime_secs(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// True if the file name starts with `.`.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.as_encoded_bytes().starts_with(b"."))
        .unwrap_or(false)
}

pub fn check_root_and_canonicalize(path: &Path) -> Result<PathBuf> {
    let path = path
        .canonicalize()
        .with_context(|| format!("canonicalize collect dir {}", path.display()))?;
    anyhow::ensure!(path.is_dir(), "{} is not a directory", path.display());
    Ok(path)
}
