//! Declarative build matrix (`build.yaml`).
//!
//! The document follows the GitHub Actions matrix shape used by firmware
//! config repositories:
//!
//! ```yaml
//! board: [nice_nano_v2]
//! shield: [corne_left, corne_right]
//! include:
//!   - board: xiao_ble
//!     shield: corne_left nice_view_adapter nice_view
//!     snippet: studio-rpc-usb-uart
//!     cmake-args: -DCONFIG_ZMK_STUDIO=y
//!   - board: nice_nano_v2
//!     shield: settings_reset
//! ```
//!
//! Top-level `board`/`shield` axes are an explicit cross product. Nothing is
//! ever defaulted to "all known boards".

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;
use crate::core::variant::Variant;

/// Parsed matrix document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatrixDocument {
    /// Board axis
    #[serde(default, deserialize_with = "one_or_many")]
    pub board: Vec<String>,

    /// Shield axis, combined with every board of the board axis
    #[serde(default, deserialize_with = "one_or_many")]
    pub shield: Vec<String>,

    /// Individually listed entries
    #[serde(default)]
    pub include: Vec<MatrixEntry>,
}

/// One entry of the matrix, possibly partial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MatrixEntry {
    #[serde(default)]
    pub board: Option<String>,

    #[serde(default)]
    pub shield: Option<String>,

    #[serde(default)]
    pub snippet: Option<String>,

    /// Extra CMake definitions, whitespace separated
    #[serde(default)]
    pub cmake_args: Option<String>,

    /// Explicit artifact name overriding the derived one
    #[serde(default)]
    pub artifact_name: Option<String>,

    /// Settings-only entry with no target of its own
    #[serde(default)]
    pub broadcast: bool,
}

impl MatrixEntry {
    /// Entry for a board with optional shield.
    pub fn board(board: impl Into<String>) -> Self {
        MatrixEntry {
            board: Some(board.into()),
            ..Default::default()
        }
    }

    pub fn with_shield(mut self, shield: impl Into<String>) -> Self {
        self.shield = Some(shield.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// The variant this entry names, if it has a board.
    pub fn variant(&self) -> Option<Variant> {
        let board = self.board.as_deref()?.trim();
        if board.is_empty() {
            return None;
        }
        let mut variant = Variant::new(board);
        if let Some(shield) = &self.shield {
            variant = variant.with_shield(shield.trim());
        }
        if let Some(snippet) = &self.snippet {
            variant = variant.with_snippet(snippet.trim());
        }
        Some(variant)
    }

    /// Extra definitions split on whitespace.
    pub fn definitions(&self) -> Vec<String> {
        self.cmake_args
            .as_deref()
            .map(|args| args.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        format!(
            "{}/{}/{}",
            self.board.as_deref().unwrap_or("-"),
            self.shield.as_deref().map(str::trim).unwrap_or("-"),
            self.snippet.as_deref().unwrap_or("-")
        )
    }
}

impl MatrixDocument {
    /// Load a matrix from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::MatrixParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&contents, path)
    }

    /// Parse matrix text. `path` is only used for error messages.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(MatrixDocument::default());
        }
        serde_yaml::from_str(contents).map_err(|e| ConfigError::MatrixParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// All entries in matrix order: the axis product first, then `include`.
    pub fn entries(&self) -> Result<Vec<MatrixEntry>, ConfigError> {
        if self.board.is_empty() && !self.shield.is_empty() {
            return Err(ConfigError::ShieldAxisWithoutBoard);
        }

        let mut entries = Vec::new();
        for board in &self.board {
            if self.shield.is_empty() {
                entries.push(MatrixEntry::board(board));
            } else {
                for shield in &self.shield {
                    entries.push(MatrixEntry::board(board).with_shield(shield));
                }
            }
        }
        entries.extend(self.include.iter().cloned());
        Ok(entries)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}
