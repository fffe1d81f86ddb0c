//! Build matrix resolution.
//!
//! Turns a [`MatrixDocument`] into an ordered, deduplicated list of
//! [`BuildJob`]s. Resolution never touches the toolchain; it only validates
//! ids against the [`Catalog`] and attaches the inputs every job shares.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::core::catalog::Catalog;
use crate::core::errors::{close_matches, ConfigError};
use crate::core::job::BuildJob;
use crate::core::matrix::{MatrixDocument, MatrixEntry};
use crate::core::variant::{ArtifactName, Variant};

/// Inputs shared by every resolved job.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Config directory handed to each build
    pub config_dir: Option<PathBuf>,

    /// Derived limits fragment, attached to every job when present
    pub limits_fragment: Option<PathBuf>,
}

/// What the expansion policy does with one matrix entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDisposition {
    /// The entry becomes a job for this variant.
    Job(Variant),
    /// The entry is excluded from the job list.
    Skip { reason: &'static str },
}

/// Expansion policy for a single entry.
///
/// - `broadcast: true` marks a settings-only entry; it never becomes a job.
/// - Any other entry must name a board. Omitted shield or snippet means
///   "none", never "all known values".
pub fn classify_entry(index: usize, entry: &MatrixEntry) -> Result<EntryDisposition, ConfigError> {
    if entry.broadcast {
        return Ok(EntryDisposition::Skip {
            reason: "settings-only entry",
        });
    }

    match entry.variant() {
        Some(variant) => Ok(EntryDisposition::Job(variant)),
        None => Err(ConfigError::MissingBoard { index }),
    }
}

/// Check every id of a variant against the catalog.
fn validate(index: usize, variant: &Variant, catalog: &Catalog) -> Result<(), ConfigError> {
    if !catalog.has_board(&variant.board) {
        return Err(ConfigError::UnknownBoard {
            index,
            board: variant.board.clone(),
            variant: variant.to_string(),
            suggestions: close_matches(&variant.board, catalog.boards()),
        });
    }

    for token in variant.shield_tokens() {
        if !catalog.has_shield(token) {
            return Err(ConfigError::UnknownShield {
                index,
                shield: token.to_string(),
                variant: variant.to_string(),
                suggestions: close_matches(token, catalog.shields()),
            });
        }
    }

    Ok(())
}

/// Resolve a matrix into build jobs.
///
/// Jobs keep matrix order. Entries producing an identical job are merged
/// into the first occurrence; entries producing *different* jobs under the
/// same artifact name are rejected.
pub fn resolve_jobs(
    doc: &MatrixDocument,
    catalog: &Catalog,
    opts: &ResolveOptions,
) -> Result<Vec<BuildJob>, ConfigError> {
    let entries = doc.entries()?;
    let mut jobs: Vec<BuildJob> = Vec::new();
    let mut by_name: HashMap<ArtifactName, (usize, usize)> = HashMap::new();

    for (i, entry) in entries.iter().enumerate() {
        let index = i + 1;
        let variant = match classify_entry(index, entry)? {
            EntryDisposition::Job(variant) => variant,
            EntryDisposition::Skip { reason } => {
                tracing::debug!("skipping entry #{} ({}): {}", index, entry.describe(), reason);
                continue;
            }
        };

        validate(index, &variant, catalog)?;
        let job = build_job(index, variant, entry, opts)?;

        match by_name.get(&job.artifact) {
            Some(&(first_index, slot)) if jobs[slot] == job => {
                tracing::debug!(
                    "entry #{} duplicates entry #{} ({})",
                    index,
                    first_index,
                    job.artifact
                );
            }
            Some(&(first_index, slot)) => {
                return Err(ConfigError::ArtifactCollision {
                    name: job.artifact.to_string(),
                    first_index,
                    first: jobs[slot].variant.to_string(),
                    second_index: index,
                    second: job.variant.to_string(),
                });
            }
            None => {
                by_name.insert(job.artifact.clone(), (index, jobs.len()));
                jobs.push(job);
            }
        }
    }

    tracing::debug!("resolved {} job(s) from {} entries", jobs.len(), entries.len());
    Ok(jobs)
}

fn build_job(
    index: usize,
    variant: Variant,
    entry: &MatrixEntry,
    opts: &ResolveOptions,
) -> Result<BuildJob, ConfigError> {
    let mut job = BuildJob::new(variant).with_definitions(entry.definitions());

    if let Some(name) = entry.artifact_name.as_deref().map(str::trim) {
        if !name.is_empty() {
            if !is_plain_file_name(name) {
                return Err(ConfigError::InvalidArtifactName {
                    index,
                    name: name.to_string(),
                });
            }
            job = job.with_artifact(ArtifactName::new(name));
        }
    }
    if let Some(dir) = &opts.config_dir {
        job = job.with_config_dir(dir);
    }
    if let Some(fragment) = &opts.limits_fragment {
        if fragment.exists() {
            job = job.with_overlay(fragment);
        }
    }
    Ok(job)
}

/// An explicit artifact name must stay inside the output and build directories.
fn is_plain_file_name(name: &str) -> bool {
    !name.contains(&['/', '\\'][..]) && name != "." && name != ".."
}
