//! Build executor with progress reporting.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::builder::errors::BuildError;
use crate::builder::output::OutputSpec;
use crate::builder::toolchain::Toolchain;
use crate::core::job::BuildJob;
use crate::util::process::tail_lines;

/// Lines of toolchain stderr kept in a [`BuildError::Toolchain`].
const STDERR_TAIL: usize = 40;

/// A binary produced and placed for one job.
#[derive(Debug, Clone)]
pub struct BuiltArtifact {
    pub job: BuildJob,
    /// Final location of the binary
    pub path: PathBuf,
    /// Extension of the binary that was found
    pub format: String,
}

/// Result of one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: BuildJob,
    pub result: Result<BuiltArtifact, BuildError>,
}

/// Outcome of a batch, in job order.
#[derive(Debug)]
pub struct BuildReport {
    pub outcomes: Vec<JobOutcome>,
    pub elapsed: Duration,
}

impl BuildReport {
    /// True iff every job produced an artifact.
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn built(&self) -> impl Iterator<Item = &BuiltArtifact> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &BuildError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }
}

/// Runs build jobs through a toolchain.
pub struct BuildExecutor<'a> {
    toolchain: &'a dyn Toolchain,
    build_dir: PathBuf,
    output: OutputSpec,
    verbose: bool,
}

impl<'a> BuildExecutor<'a> {
    /// Create an executor building into `build_dir/<artifact>`.
    pub fn new(toolchain: &'a dyn Toolchain, build_dir: impl Into<PathBuf>, output: OutputSpec) -> Self {
        BuildExecutor {
            toolchain,
            build_dir: build_dir.into(),
            output,
            verbose: false,
        }
    }

    /// Enable verbose output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Build directory of one job.
    pub fn job_build_dir(&self, job: &BuildJob) -> PathBuf {
        self.build_dir.join(job.artifact.as_str())
    }

    /// Build one job: invoke the toolchain once, locate the binary and place it.
    pub fn run_job(&self, job: &BuildJob) -> Result<BuiltArtifact, BuildError> {
        let tuple = job.variant.to_string();
        let build_dir = self.job_build_dir(job);
        self.output.clear_stale(&build_dir).map_err(|e| BuildError::Io {
            job: tuple.clone(),
            source: e.into(),
        })?;

        let process = self.toolchain.build_command(job, &build_dir).into_process();
        tracing::debug!("{}: {}", self.toolchain.name(), process.display_command());

        let output = process.exec().map_err(|e| BuildError::Io {
            job: tuple.clone(),
            source: e.into(),
        })?;

        if self.verbose {
            eprint!("{}", String::from_utf8_lossy(&output.stdout));
            eprint!("{}", String::from_utf8_lossy(&output.stderr));
        }

        if !output.status.success() {
            return Err(BuildError::Toolchain {
                job: tuple,
                code: output.status.code(),
                stderr: tail_lines(&output.stderr, STDERR_TAIL),
            });
        }

        let (binary, format) = self
            .output
            .locate(&build_dir)
            .ok_or_else(|| BuildError::NoArtifact {
                job: tuple.clone(),
                searched: self.output.candidates(&build_dir),
            })?;

        let path = self
            .output
            .place(&binary, &job.artifact, &format)
            .map_err(|e| BuildError::Io {
                job: tuple,
                source: e.into(),
            })?;

        tracing::debug!("{} -> {}", job.artifact, path.display());
        Ok(BuiltArtifact {
            job: job.clone(),
            path,
            format,
        })
    }

    /// Run every job, at most `jobs` at a time.
    ///
    /// A failing job never stops the others. The report lists outcomes in
    /// the order of `batch`, whatever order they completed in.
    pub fn execute(&self, batch: &[BuildJob], jobs: Option<usize>) -> Result<BuildReport> {
        let start = Instant::now();

        if self.verbose {
            eprintln!("   Compiling {} target(s)", batch.len());
        }

        let pb = if !self.verbose && batch.len() > 1 {
            let pb = ProgressBar::new(batch.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.unwrap_or(0))
            .build()
            .context("failed to create build thread pool")?;

        let outcomes: Vec<JobOutcome> = pool.install(|| {
            batch
                .par_iter()
                .map(|job| {
                    let result = self.run_job(job);
                    if let Some(pb) = &pb {
                        pb.set_message(job.artifact.to_string());
                        pb.inc(1);
                    }
                    if let Err(e) = &result {
                        tracing::debug!("{}", e);
                    }
                    JobOutcome {
                        job: job.clone(),
                        result,
                    }
                })
                .collect()
        });

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let report = BuildReport {
            outcomes,
            elapsed: start.elapsed(),
        };
        eprintln!(
            "    Finished {} of {} target(s) in {:.2}s",
            report.built().count(),
            batch.len(),
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }

    /// Root of all job build directories.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }
}
