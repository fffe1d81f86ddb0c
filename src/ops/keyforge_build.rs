//! Implementation of `keyforge build`.
//!
//! The order is fixed: combo limits are derived and written first, then the
//! matrix is resolved, then the jobs run. No job ever starts against a stale
//! limits fragment.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Serialize;

use crate::builder::{BuildExecutor, BuildReport, OutputSpec, Toolchain, WestToolchain};
use crate::core::catalog::Catalog;
use crate::core::job::BuildJob;
use crate::core::limits::ResourceLimits;
use crate::core::matrix::MatrixDocument;
use crate::ops::derive_limits::derive_and_write;
use crate::ops::resolve::{resolve_jobs, ResolveOptions};
use crate::util::config::Config;
use crate::util::fs;
use crate::util::process::find_executable;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Matrix document overriding `build.matrix`
    pub matrix: Option<PathBuf>,

    /// Output directory overriding `build.output_dir`
    pub output_dir: Option<PathBuf>,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Leave the limits fragment untouched
    pub skip_limits: bool,

    /// Verbose output
    pub verbose: bool,
}

/// Everything decided before the first job runs.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    /// Derived combo limits, if derivation ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceLimits>,

    pub jobs: Vec<BuildJob>,
}

/// Derive limits, then resolve the matrix into jobs.
pub fn plan(root: &Path, config: &Config, opts: &BuildOptions) -> Result<BuildPlan> {
    let fragment = config.combos.fragment_path(root);

    let limits = if opts.skip_limits {
        tracing::debug!("skipping combo limit derivation");
        None
    } else {
        let artifact = config.combos.artifact_path(root);
        eprintln!("    Deriving combo limits from {}", fs::display_relative(root, &artifact));
        derive_and_write(&artifact, &fragment, config.combos.required)?
    };

    let matrix_path = opts
        .matrix
        .clone()
        .unwrap_or_else(|| config.build.matrix_path(root));
    let doc = MatrixDocument::load(&matrix_path)?;

    let catalog = Catalog::discover(
        &config.catalog.board_roots(root),
        &config.catalog.boards,
        &config.catalog.shields,
    );

    let resolve_opts = ResolveOptions {
        config_dir: Some(config.build.config_dir(root)),
        limits_fragment: Some(fragment),
    };
    let jobs = resolve_jobs(&doc, &catalog, &resolve_opts)?;

    Ok(BuildPlan { limits, jobs })
}

/// Build every job of the matrix with west.
pub fn build(root: &Path, config: &Config, opts: &BuildOptions) -> Result<BuildReport> {
    let plan = plan(root, config, opts)?;
    let toolchain = west_toolchain(root, config)?;
    execute_plan(root, config, opts, &plan, &toolchain)
}

/// The configured west.
///
/// A bare name is looked up in PATH; a path is taken relative to `root`.
pub fn west_toolchain(root: &Path, config: &Config) -> Result<WestToolchain> {
    let mut west = config.build.west();
    if west.components().count() == 1 {
        if find_executable(&west.to_string_lossy()).is_none() {
            bail!(
                "`{}` not found in PATH\n\
                 hint: activate the Zephyr environment, or set `build.west` in keyforge.toml",
                west.display()
            );
        }
    } else {
        west = root.join(west);
    }
    Ok(WestToolchain::new(west, config.build.app_dir(root)).pristine(config.build.pristine()))
}

/// Run a resolved plan through `toolchain`.
pub fn execute_plan(
    root: &Path,
    config: &Config,
    opts: &BuildOptions,
    plan: &BuildPlan,
    toolchain: &dyn Toolchain,
) -> Result<BuildReport> {
    if plan.jobs.is_empty() {
        tracing::warn!("the build matrix has no jobs");
    }

    let output_dir = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| config.build.output_dir(root));
    let output = OutputSpec::firmware(
        config.build.primary_format(),
        config.build.fallback_format(),
        output_dir,
    );

    let executor = BuildExecutor::new(toolchain, config.build.build_dir(root), output).verbose(opts.verbose);
    executor.execute(&plan.jobs, opts.jobs.or(config.build.jobs))
}
