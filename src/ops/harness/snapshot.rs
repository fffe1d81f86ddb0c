//! Golden snapshots of filtered events.

use std::path::Path;

use anyhow::{Context, Result};

use crate::util::fs;

/// Read a snapshot. A missing file is an empty sequence.
pub fn load(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        tracing::debug!("no snapshot at {}; comparing against nothing", path.display());
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
    Ok(text.lines().map(str::to_string).collect())
}

/// Snapshot file contents for `lines`.
pub fn render(lines: &[String]) -> String {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// Replace the snapshot with `lines`.
pub fn accept(path: &Path, lines: &[String]) -> Result<()> {
    fs::write_atomic(path, render(lines).as_bytes())
        .with_context(|| format!("failed to update snapshot: {}", path.display()))
}
