//! Configuration error types and diagnostics.
//!
//! A `ConfigError` is fatal: it aborts the invocation before any build job
//! starts, since every downstream step would run on unsound inputs.

use std::path::PathBuf;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error in the matrix, catalog, combo artifact or pattern set.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ConfigError {
    #[error("failed to parse matrix `{}`: {message}", .path.display())]
    #[diagnostic(code(keyforge::matrix::parse))]
    MatrixParse { path: PathBuf, message: String },

    #[error("matrix entry #{index} has no board")]
    #[diagnostic(
        code(keyforge::matrix::missing_board),
        help("add a `board`, or mark settings-only entries with `broadcast: true`")
    )]
    MissingBoard { index: usize },

    #[error("matrix declares a `shield` axis without a `board` axis")]
    #[diagnostic(code(keyforge::matrix::shield_axis))]
    ShieldAxisWithoutBoard,

    #[error("matrix entry #{index} ({variant}) names unknown board `{board}`")]
    #[diagnostic(code(keyforge::matrix::unknown_board))]
    UnknownBoard {
        index: usize,
        board: String,
        variant: String,
        suggestions: Vec<String>,
    },

    #[error("matrix entry #{index} ({variant}) names unknown shield `{shield}`")]
    #[diagnostic(code(keyforge::matrix::unknown_shield))]
    UnknownShield {
        index: usize,
        shield: String,
        variant: String,
        suggestions: Vec<String>,
    },

    #[error(
        "artifact name `{name}` is produced by entry #{first_index} ({first}) and entry #{second_index} ({second})"
    )]
    #[diagnostic(
        code(keyforge::matrix::collision),
        help("give one of the entries an explicit `artifact-name`")
    )]
    ArtifactCollision {
        name: String,
        first_index: usize,
        first: String,
        second_index: usize,
        second: String,
    },

    #[error("matrix entry #{index} has invalid artifact name `{name}`")]
    #[diagnostic(
        code(keyforge::matrix::artifact_name),
        help("an artifact name is a single file name; drop any `/`, `\\` or `..`")
    )]
    InvalidArtifactName { index: usize, name: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    ComboParse(#[from] ComboParseError),

    #[error("combo artifact not found: {}", .path.display())]
    #[diagnostic(code(keyforge::combos::missing))]
    MissingComboArtifact { path: PathBuf },

    #[error("invalid pattern rule at {}:{line}: {message}", .path.display())]
    #[diagnostic(code(keyforge::harness::pattern))]
    PatternRule {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// A combo record that cannot be read as a key-position set.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("malformed combo record at line {line}: {reason}")]
#[diagnostic(
    code(keyforge::combos::malformed),
    help("fix the generator output; limits are never guessed from partial records")
)]
pub struct ComboParseError {
    /// 1-based line of the offending record
    pub line: usize,
    pub reason: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("malformed record")]
    pub span: SourceSpan,
}

impl ConfigError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ConfigError::UnknownBoard {
                board, suggestions, ..
            } => {
                let mut diag = Diagnostic::error(self.to_string());
                if !suggestions.is_empty() {
                    diag = diag.with_context(format!("did you mean: {}", suggestions.join(", ")));
                }
                diag.with_suggestion(format!(
                    "Add `{}` to `catalog.boards` in keyforge.toml if it is an out-of-tree board",
                    board
                ))
            }

            ConfigError::UnknownShield {
                shield,
                suggestions,
                ..
            } => {
                let mut diag = Diagnostic::error(self.to_string());
                if !suggestions.is_empty() {
                    diag = diag.with_context(format!("did you mean: {}", suggestions.join(", ")));
                }
                diag.with_suggestion(format!(
                    "Add `{}` to `catalog.shields`, or place `{}.overlay` under boards/shields/",
                    shield, shield
                ))
            }

            ConfigError::ArtifactCollision { .. } => Diagnostic::error(self.to_string())
                .with_suggestion("Give one of the entries an explicit `artifact-name`"),

            ConfigError::InvalidArtifactName { .. } => Diagnostic::error(self.to_string())
                .with_suggestion("Use a plain file name such as `corne_left-nice_nano_v2`"),

            ConfigError::MissingBoard { .. } => Diagnostic::error(self.to_string())
                .with_suggestion("Mark settings-only entries with `broadcast: true`"),

            ConfigError::ComboParse(e) => Diagnostic::error(e.to_string())
                .with_context(format!("in {}", e.src.name()))
                .with_suggestion(suggestions::REGENERATE_COMBOS),

            ConfigError::MissingComboArtifact { path } => Diagnostic::error(self.to_string())
                .with_location(path.clone())
                .with_suggestion(suggestions::REGENERATE_COMBOS),

            ConfigError::MatrixParse { path, .. } | ConfigError::PatternRule { path, .. } => {
                Diagnostic::error(self.to_string()).with_location(path.clone())
            }

            ConfigError::ShieldAxisWithoutBoard => Diagnostic::error(self.to_string()),
        }
    }
}

/// Find ids close to `needle` for "did you mean" hints.
pub fn close_matches<'a>(needle: &str, known: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let needle = needle.to_lowercase();
    let mut matches: Vec<String> = known
        .into_iter()
        .filter(|k| {
            let k = k.to_lowercase();
            k.contains(&needle) || needle.contains(&k) || common_prefix(&k, &needle) >= 4
        })
        .cloned()
        .collect();
    matches.sort();
    matches.truncate(3);
    matches
}

fn common_prefix(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_board_diagnostic() {
        let err = ConfigError::UnknownBoard {
            index: 2,
            board: "nice_nano".to_string(),
            variant: "nice_nano/corne_left/-".to_string(),
            suggestions: vec!["nice_nano_v2".to_string()],
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("entry #2"));
        assert!(output.contains("nice_nano/corne_left/-"));
        assert!(output.contains("did you mean: nice_nano_v2"));
        assert!(output.contains("catalog.boards"));
    }

    #[test]
    fn test_close_matches() {
        let known = vec![
            "nice_nano_v2".to_string(),
            "xiao_ble".to_string(),
            "seeeduino_xiao".to_string(),
        ];
        assert_eq!(close_matches("nice_nano", &known), vec!["nice_nano_v2"]);
        assert!(close_matches("planck", &known).is_empty());
    }
}
