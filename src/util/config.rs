//! Configuration file support for Keyforge.
//!
//! Keyforge supports two configuration file locations:
//! - Global: `~/.keyforge/config.toml` - User-wide defaults
//! - Project: `keyforge.toml` at the project root - Project-specific overrides
//!
//! Project config takes precedence over global config. Every setting is
//! optional; accessors fall back to the conventional layout of a firmware
//! config repository.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the project configuration file.
pub const PROJECT_CONFIG_FILE: &str = "keyforge.toml";

/// Keyforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Combo limit derivation settings
    pub combos: CombosConfig,

    /// Known boards and shields
    pub catalog: CatalogConfig,

    /// Emulation test settings
    pub test: TestConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Matrix document (default: build.yaml)
    pub matrix: Option<PathBuf>,

    /// Firmware application source directory (default: zmk/app)
    pub app_dir: Option<PathBuf>,

    /// User config directory passed as ZMK_CONFIG (default: config)
    pub config_dir: Option<PathBuf>,

    /// Per-job build directories live under this (default: build)
    pub build_dir: Option<PathBuf>,

    /// Where finished artifacts are placed (default: firmware)
    pub output_dir: Option<PathBuf>,

    /// Default number of parallel jobs (None = auto-detect)
    pub jobs: Option<usize>,

    /// The west executable (default: west)
    pub west: Option<PathBuf>,

    /// Preferred binary format (default: uf2)
    pub primary_format: Option<String>,

    /// Format used when the preferred one is absent (default: bin)
    pub fallback_format: Option<String>,

    /// Pass `-p` for pristine builds (default: true)
    pub pristine: Option<bool>,
}

/// Combo limit derivation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CombosConfig {
    /// Generated combo-definition artifact (default: config/combos.dtsi)
    pub artifact: Option<PathBuf>,

    /// Kconfig fragment receiving the limits (default: config/combos.conf)
    pub fragment: Option<PathBuf>,

    /// Fail when the artifact is missing instead of skipping derivation
    #[serde(default)]
    pub required: bool,
}

/// Catalog configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Boards known in addition to the scanned ones
    pub boards: Vec<String>,

    /// Shields known in addition to the scanned ones
    pub shields: Vec<String>,

    /// Directories scanned for boards and shields (default: boards, zmk/app/boards)
    pub board_roots: Vec<PathBuf>,
}

/// Emulation test configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Directory searched for scenarios (default: tests)
    pub root: Option<PathBuf>,

    /// Emulation board (default: native_posix_64)
    pub board: Option<String>,

    /// Wall-clock cap per emulated run in seconds (default: 60)
    pub timeout_secs: Option<u64>,

    /// Extra arguments passed to the emulated executable
    pub run_args: Vec<String>,

    /// Pattern set file name inside a scenario (default: events.patterns)
    pub patterns_file: Option<String>,

    /// Snapshot file name inside a scenario (default: keycode_events.snapshot)
    pub snapshot_file: Option<String>,

    /// Scenarios run in parallel (None = auto-detect)
    pub jobs: Option<usize>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        // Build settings
        let b = other.build;
        if b.matrix.is_some() {
            self.build.matrix = b.matrix;
        }
        if b.app_dir.is_some() {
            self.build.app_dir = b.app_dir;
        }
        if b.config_dir.is_some() {
            self.build.config_dir = b.config_dir;
        }
        if b.build_dir.is_some() {
            self.build.build_dir = b.build_dir;
        }
        if b.output_dir.is_some() {
            self.build.output_dir = b.output_dir;
        }
        if b.jobs.is_some() {
            self.build.jobs = b.jobs;
        }
        if b.west.is_some() {
            self.build.west = b.west;
        }
        if b.primary_format.is_some() {
            self.build.primary_format = b.primary_format;
        }
        if b.fallback_format.is_some() {
            self.build.fallback_format = b.fallback_format;
        }
        if b.pristine.is_some() {
            self.build.pristine = b.pristine;
        }

        // Combo settings
        if other.combos.artifact.is_some() {
            self.combos.artifact = other.combos.artifact;
        }
        if other.combos.fragment.is_some() {
            self.combos.fragment = other.combos.fragment;
        }
        if other.combos.required {
            self.combos.required = true;
        }

        // Catalog lists replace rather than extend
        if !other.catalog.boards.is_empty() {
            self.catalog.boards = other.catalog.boards;
        }
        if !other.catalog.shields.is_empty() {
            self.catalog.shields = other.catalog.shields;
        }
        if !other.catalog.board_roots.is_empty() {
            self.catalog.board_roots = other.catalog.board_roots;
        }

        // Test settings
        let t = other.test;
        if t.root.is_some() {
            self.test.root = t.root;
        }
        if t.board.is_some() {
            self.test.board = t.board;
        }
        if t.timeout_secs.is_some() {
            self.test.timeout_secs = t.timeout_secs;
        }
        if !t.run_args.is_empty() {
            self.test.run_args = t.run_args;
        }
        if t.patterns_file.is_some() {
            self.test.patterns_file = t.patterns_file;
        }
        if t.snapshot_file.is_some() {
            self.test.snapshot_file = t.snapshot_file;
        }
        if t.jobs.is_some() {
            self.test.jobs = t.jobs;
        }
    }
}

/// Resolve `path` against `root` unless it is already absolute.
fn rooted(root: &Path, path: Option<&PathBuf>, default: &str) -> PathBuf {
    let path = path.cloned().unwrap_or_else(|| PathBuf::from(default));
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

impl BuildConfig {
    pub fn matrix_path(&self, root: &Path) -> PathBuf {
        rooted(root, self.matrix.as_ref(), "build.yaml")
    }

    pub fn app_dir(&self, root: &Path) -> PathBuf {
        rooted(root, self.app_dir.as_ref(), "zmk/app")
    }

    pub fn config_dir(&self, root: &Path) -> PathBuf {
        rooted(root, self.config_dir.as_ref(), "config")
    }

    pub fn build_dir(&self, root: &Path) -> PathBuf {
        rooted(root, self.build_dir.as_ref(), "build")
    }

    pub fn output_dir(&self, root: &Path) -> PathBuf {
        rooted(root, self.output_dir.as_ref(), "firmware")
    }

    pub fn west(&self) -> PathBuf {
        self.west.clone().unwrap_or_else(|| PathBuf::from("west"))
    }

    pub fn primary_format(&self) -> &str {
        self.primary_format.as_deref().unwrap_or("uf2")
    }

    pub fn fallback_format(&self) -> &str {
        self.fallback_format.as_deref().unwrap_or("bin")
    }

    pub fn pristine(&self) -> bool {
        self.pristine.unwrap_or(true)
    }
}

impl CombosConfig {
    pub fn artifact_path(&self, root: &Path) -> PathBuf {
        rooted(root, self.artifact.as_ref(), "config/combos.dtsi")
    }

    pub fn fragment_path(&self, root: &Path) -> PathBuf {
        rooted(root, self.fragment.as_ref(), "config/combos.conf")
    }
}

impl CatalogConfig {
    pub fn board_roots(&self, root: &Path) -> Vec<PathBuf> {
        if self.board_roots.is_empty() {
            vec![root.join("boards"), root.join("zmk/app/boards")]
        } else {
            self.board_roots
                .iter()
                .map(|p| rooted(root, Some(p), "boards"))
                .collect()
        }
    }
}

impl TestConfig {
    pub fn root(&self, root: &Path) -> PathBuf {
        rooted(root, self.root.as_ref(), "tests")
    }

    pub fn board(&self) -> &str {
        self.board.as_deref().unwrap_or("native_posix_64")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(60))
    }

    pub fn patterns_file(&self) -> &str {
        self.patterns_file.as_deref().unwrap_or("events.patterns")
    }

    pub fn snapshot_file(&self) -> &str {
        self.snapshot_file
            .as_deref()
            .unwrap_or("keycode_events.snapshot")
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (keyforge.toml)
/// 2. Global config (~/.keyforge/config.toml)
/// 3. Defaults
///
/// Missing files are skipped; a file that exists but does not parse is an error.
pub fn load_config(global_path: &Path, project_path: &Path) -> Result<Config> {
    let mut config = Config::default();

    // Load global config first
    if global_path.exists() {
        config.merge(Config::load(global_path)?);
    }

    // Project config overrides global
    if project_path.exists() {
        config.merge(Config::load(project_path)?);
    }

    tracing::debug!("loaded config: {:?}", config.build);
    Ok(config)
}

/// Get the global keyforge config directory (~/.keyforge).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".keyforge"))
}
