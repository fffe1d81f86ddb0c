//! Buildable variants and their canonical artifact names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the shield segment and the board id.
pub const BOARD_SEPARATOR: char = '-';

/// Join character between individual shield tokens.
pub const SHIELD_JOIN: char = '+';

/// One buildable combination of board, shield and snippet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    /// Board id (required)
    pub board: String,

    /// Shield overlays, possibly several separated by whitespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shield: Option<String>,

    /// Snippet id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Variant {
    /// Create a board-only variant.
    pub fn new(board: impl Into<String>) -> Self {
        Variant {
            board: board.into(),
            shield: None,
            snippet: None,
        }
    }

    /// Set the shield. Runs of whitespace collapse to one space; blank
    /// shields are treated as absent.
    pub fn with_shield(mut self, shield: impl AsRef<str>) -> Self {
        let tokens: Vec<&str> = shield.as_ref().split_whitespace().collect();
        self.shield = if tokens.is_empty() {
            None
        } else {
            Some(tokens.join(" "))
        };
        self
    }

    /// Set the snippet. Blank snippets are treated as absent.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        let snippet = snippet.into();
        self.snippet = if snippet.trim().is_empty() {
            None
        } else {
            Some(snippet)
        };
        self
    }

    /// Individual shield overlay names, in declaration order.
    pub fn shield_tokens(&self) -> Vec<&str> {
        self.shield
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// The canonical artifact name for this variant.
    pub fn artifact_name(&self) -> ArtifactName {
        ArtifactName::from_variant(self)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.board,
            self.shield.as_deref().map(str::trim).unwrap_or("-"),
            self.snippet.as_deref().unwrap_or("-")
        )
    }
}

/// Canonical output name of a variant's firmware artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Use an explicit name, bypassing derivation.
    pub fn new(name: impl Into<String>) -> Self {
        ArtifactName(name.into())
    }

    /// Derive the name from a variant.
    ///
    /// Shield tokens are joined with `+` and prefixed to the board id with
    /// `-`. A snippet, when present, is appended with another `-`.
    pub fn from_variant(variant: &Variant) -> Self {
        let tokens = variant.shield_tokens();
        let mut name = String::new();

        if !tokens.is_empty() {
            name.push_str(&tokens.join(&SHIELD_JOIN.to_string()));
            name.push(BOARD_SEPARATOR);
        }
        name.push_str(&variant.board);

        if let Some(snippet) = &variant.snippet {
            name.push(BOARD_SEPARATOR);
            name.push_str(snippet);
        }

        ArtifactName(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for this artifact with the given extension.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
