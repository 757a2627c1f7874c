use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

/// Sibling temp path for `target` (`<name>.tmp`).
pub fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_else(|| PackagePaths::get().snapshot_filename());
    target
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("{name}.tmp"))
}

/// Write `contents` to a temp file next to `target`, then rename it over `target`.
/// Readers see either the old file or the new one, never a partial write.
pub fn write_atomically(target: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = temp_path_for(target);
    {
        let mut f = fs::File::create(&temp_path)
            .with_context(|| format!("create temp file {}", temp_path.display()))?;
        f.write_all(contents)
            .with_context(|| format!("write temp file {}", temp_path.display()))?;
        f.sync_all().context("sync temp file")?;
    }
    rename_temp_to_final(&temp_path, target)
}

pub fn rename_temp_to_final(temp_path: &Path, final_path: &Path) -> Result<()> {
    fs::rename(temp_path, final_path).with_context(|| {
        format!(
            "atomic rename temp file to final path ({} -> {})",
            temp_path.display(),
            final_path.display()
        )
    })
}
