//! Test utilities for Keyforge unit tests.
//!
//! This module provides a fake [`Toolchain`] that runs shell scripts in place
//! of west, plus fixture builders for config repositories and test scenarios.
//!
//! # Example
//!
//! ```rust,ignore
//! use keyforge::test_support::{ProjectFixture, ScriptToolchain};
//!
//! #[test]
//! fn test_example() {
//!     let tmp = tempfile::TempDir::new().unwrap();
//!     let root = ProjectFixture::new()
//!         .matrix("include:\n  - board: b1\n")
//!         .write_to(tmp.path())
//!         .unwrap();
//!
//!     let toolchain = ScriptToolchain::producing("uf2");
//!     // Build with the fake toolchain...
//! }
//! ```

pub mod fixtures;

use std::path::Path;

use crate::builder::toolchain::{CommandSpec, Toolchain};
use crate::core::job::BuildJob;

// Re-export fixtures for convenience
pub use fixtures::*;

/// A toolchain that runs `sh -c <script>` instead of west.
///
/// The script sees the job as positional parameters:
/// `$1` build directory, `$2` board, `$3` shield, `$4` snippet.
/// Missing shield or snippet are passed as empty strings.
#[derive(Debug, Clone)]
pub struct ScriptToolchain {
    script: String,
}

impl ScriptToolchain {
    /// Create a toolchain running the given script for every job.
    pub fn new(script: impl Into<String>) -> Self {
        ScriptToolchain {
            script: script.into(),
        }
    }

    /// A toolchain that always produces `zephyr/zmk.<ext>`.
    pub fn producing(ext: &str) -> Self {
        Self::new(format!(
            r#"mkdir -p "$1/zephyr" && printf '%s' "$2" > "$1/zephyr/zmk.{}""#,
            ext
        ))
    }

    /// A toolchain that installs `emulator` as the test executable.
    ///
    /// `emulator` is a shell script body; it is written verbatim to
    /// `zephyr/zmk.exe` and made executable.
    pub fn emulating(emulator: &str) -> Self {
        Self::new(format!(
            "mkdir -p \"$1/zephyr\" && cat > \"$1/zephyr/zmk.exe\" <<'KEYFORGE_EOF'\n#!/bin/sh\n{}\nKEYFORGE_EOF\nchmod +x \"$1/zephyr/zmk.exe\"",
            emulator
        ))
    }
}

impl Toolchain for ScriptToolchain {
    fn name(&self) -> &str {
        "script"
    }

    fn build_command(&self, job: &BuildJob, build_dir: &Path) -> CommandSpec {
        let variant = &job.variant;
        CommandSpec::new("sh").args([
            "-c".to_string(),
            self.script.clone(),
            "fake-west".to_string(),
            build_dir.display().to_string(),
            variant.board.clone(),
            variant.shield.clone().unwrap_or_default(),
            variant.snippet.clone().unwrap_or_default(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variant::Variant;
    use tempfile::TempDir;

    #[test]
    fn test_script_toolchain_passes_job() {
        let tmp = TempDir::new().unwrap();
        let job = BuildJob::new(Variant::new("b1").with_shield("left"));
        let toolchain = ScriptToolchain::new(r#"mkdir -p "$1" && printf '%s|%s|%s' "$2" "$3" "$4" > "$1/args""#);

        let status = toolchain
            .build_command(&job, &tmp.path().join("out"))
            .into_process()
            .status()
            .unwrap();

        assert!(status.success());
        assert_eq!(std::fs::read_to_string(tmp.path().join("out/args")).unwrap(), "b1|left|");
    }

    #[cfg(unix)]
    #[test]
    fn test_emulating_installs_executable() {
        let tmp = TempDir::new().unwrap();
        let job = BuildJob::new(Variant::new("native_posix_64"));
        let toolchain = ScriptToolchain::emulating("echo '<dbg> kscan: > pressed'");

        toolchain
            .build_command(&job, tmp.path())
            .into_process()
            .status()
            .unwrap();

        let out = std::process::Command::new(tmp.path().join("zephyr/zmk.exe"))
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout), "<dbg> kscan: > pressed\n");
    }
}
