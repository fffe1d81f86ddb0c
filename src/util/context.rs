//! Global context for Keyforge operations.
//!
//! Provides centralized access to the working directory, the project root,
//! and the merged configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::util::config::{global_config_dir, load_config, Config, PROJECT_CONFIG_FILE};

/// Files whose presence marks a project root, in priority order.
pub const ROOT_MARKERS: &[&str] = &[PROJECT_CONFIG_FILE, "build.yaml"];

/// Error locating the project root.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("could not find `keyforge.toml` or `build.yaml` in `{}` or any parent directory", .dir.display())]
    NotFound { dir: PathBuf },
}

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global Keyforge data (~/.keyforge/)
    home: PathBuf,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let home = global_config_dir().unwrap_or_else(|| PathBuf::from(".keyforge"));

        Ok(GlobalContext {
            cwd,
            home,
            color: true,
        })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the Keyforge home directory (~/.keyforge/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    /// Find the project root, starting from cwd and searching upward.
    pub fn find_project_root(&self) -> Result<PathBuf, ProjectError> {
        let mut current = self.cwd.clone();
        loop {
            if ROOT_MARKERS.iter().any(|m| current.join(m).is_file()) {
                return Ok(current);
            }
            if !current.pop() {
                return Err(ProjectError::NotFound {
                    dir: self.cwd.clone(),
                });
            }
        }
    }

    /// Load the merged global and project configuration for `root`.
    pub fn load_config(&self, root: &Path) -> Result<Config> {
        load_config(&self.config_path(), &root.join(PROJECT_CONFIG_FILE))
    }
}
