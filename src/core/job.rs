//! Build jobs: a variant plus its resolved toolchain inputs.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::variant::{ArtifactName, Variant};

/// A concrete unit of work for the build executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildJob {
    /// Board/shield/snippet being built
    pub variant: Variant,

    /// Canonical output name
    pub artifact: ArtifactName,

    /// Kconfig overlays passed to the toolchain, in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conf_overlays: Vec<PathBuf>,

    /// Extra `-D` definitions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub definitions: Vec<String>,

    /// Config directory handed to the firmware build (`ZMK_CONFIG`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,
}

impl BuildJob {
    /// Create a job for a variant using its derived artifact name.
    pub fn new(variant: Variant) -> Self {
        let artifact = variant.artifact_name();
        BuildJob {
            variant,
            artifact,
            conf_overlays: Vec::new(),
            definitions: Vec::new(),
            config_dir: None,
        }
    }

    /// Override the artifact name.
    pub fn with_artifact(mut self, artifact: ArtifactName) -> Self {
        self.artifact = artifact;
        self
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn with_overlay(mut self, overlay: impl Into<PathBuf>) -> Self {
        self.conf_overlays.push(overlay.into());
        self
    }

    pub fn with_definitions<I, S>(mut self, defs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definitions.extend(defs.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for BuildJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.artifact, self.variant)
    }
}
