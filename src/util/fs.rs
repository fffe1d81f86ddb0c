//! Filesystem utilities.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Create a temp file next to `dest` so the final rename stays on one filesystem.
fn sibling_temp(dest: &Path) -> Result<NamedTempFile> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    ensure_dir(parent)?;
    tempfile::Builder::new()
        .prefix(".keyforge-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))
}

/// Write bytes to `dest` atomically.
///
/// Readers observe either the previous contents or the new contents, never
/// a partial write. An existing file is replaced.
pub fn write_atomic(dest: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = sibling_temp(dest)?;
    tmp.write_all(contents)
        .with_context(|| format!("failed to write {}", dest.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed to flush {}", dest.display()))?;
    tmp.persist(dest)
        .with_context(|| format!("failed to move file into place: {}", dest.display()))?;
    Ok(())
}

/// Copy `src` to `dest` atomically, replacing any existing file.
pub fn copy_atomic(src: &Path, dest: &Path) -> Result<()> {
    let tmp = sibling_temp(dest)?;
    fs::copy(src, tmp.path()).with_context(|| {
        format!("failed to copy {} to {}", src.display(), dest.display())
    })?;
    tmp.persist(dest)
        .with_context(|| format!("failed to move file into place: {}", dest.display()))?;
    Ok(())
}

/// Remove a file, treating an already-missing file as success.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("failed to remove {}", path.display()))
        }
        _ => Ok(()),
    }
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Render `path` relative to `base` when it lives inside it.
pub fn display_relative(base: &Path, path: &Path) -> String {
    if path.starts_with(base) {
        relative_path(base, path).display().to_string()
    } else {
        path.display().to_string()
    }
}
