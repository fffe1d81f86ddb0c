//! Per-job build errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single build job.
///
/// Build errors never abort the batch; they are collected into the
/// [`BuildReport`](super::BuildReport). Each variant names the job's
/// `board/shield/snippet` tuple.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("toolchain failed for {job} ({})", describe_exit(.code))]
    Toolchain {
        job: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("no firmware produced for {job}; looked for {}", describe_paths(.searched))]
    NoArtifact { job: String, searched: Vec<PathBuf> },

    #[error("i/o error while building {job}")]
    Io {
        job: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl BuildError {
    /// The `board/shield/snippet` tuple of the failed job.
    pub fn job(&self) -> &str {
        match self {
            BuildError::Toolchain { job, .. }
            | BuildError::NoArtifact { job, .. }
            | BuildError::Io { job, .. } => job,
        }
    }

    /// Short machine-readable kind, used in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::Toolchain { .. } => "toolchain",
            BuildError::NoArtifact { .. } => "no-artifact",
            BuildError::Io { .. } => "io",
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn describe_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_job() {
        let err = BuildError::Toolchain {
            job: "nice_nano_v2/corne_left/-".to_string(),
            code: Some(2),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "toolchain failed for nice_nano_v2/corne_left/- (exit code 2)");
        assert_eq!(err.job(), "nice_nano_v2/corne_left/-");

        let err = BuildError::NoArtifact {
            job: "b1/-/-".to_string(),
            searched: vec![PathBuf::from("build/b1/zephyr/zmk.uf2"), PathBuf::from("build/b1/zephyr/zmk.bin")],
        };
        assert!(err.to_string().contains("build/b1/zephyr/zmk.uf2, build/b1/zephyr/zmk.bin"));
        assert_eq!(err.kind(), "no-artifact");
    }
}
