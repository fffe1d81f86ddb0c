//! Catalog of known board and shield ids.
//!
//! Matrix entries are validated against the catalog so that a typo in a
//! board or shield id fails the invocation instead of producing a confusing
//! toolchain error halfway through a batch.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Suffix of a board's default Kconfig file (`<board>_defconfig`).
const DEFCONFIG_SUFFIX: &str = "_defconfig";

/// Extension of shield overlay files.
const OVERLAY_EXT: &str = "overlay";

/// Known board and shield ids.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    boards: BTreeSet<String>,
    shields: BTreeSet<String>,
    permissive: bool,
}

impl Catalog {
    /// An empty catalog that knows nothing.
    pub fn new() -> Self {
        Catalog::default()
    }

    /// A catalog that accepts every id.
    pub fn permissive() -> Self {
        Catalog {
            permissive: true,
            ..Default::default()
        }
    }

    /// Build a catalog from configured ids and scanned board roots.
    ///
    /// Falls back to [`Catalog::permissive`] when there is nothing to
    /// validate against at all.
    pub fn discover(
        roots: &[PathBuf],
        extra_boards: &[String],
        extra_shields: &[String],
    ) -> Self {
        let mut catalog = Catalog::new();
        for board in extra_boards {
            catalog.add_board(board);
        }
        for shield in extra_shields {
            catalog.add_shield(shield);
        }
        for root in roots {
            catalog.scan_root(root);
        }

        if catalog.boards.is_empty() && catalog.shields.is_empty() {
            tracing::debug!("no known boards or shields; matrix ids will not be validated");
            return Catalog::permissive();
        }

        tracing::debug!(
            "catalog: {} boards, {} shields",
            catalog.boards.len(),
            catalog.shields.len()
        );
        catalog
    }

    pub fn add_board(&mut self, board: impl Into<String>) {
        self.boards.insert(board.into());
    }

    pub fn add_shield(&mut self, shield: impl Into<String>) {
        self.shields.insert(shield.into());
    }

    /// Scan a board root for `<board>_defconfig` and `shields/**/<shield>.overlay`.
    pub fn scan_root(&mut self, root: &Path) {
        if !root.is_dir() {
            tracing::debug!("board root {} does not exist", root.display());
            return;
        }

        let shields_dir = root.join("shields");
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if let Some(board) = name.strip_suffix(DEFCONFIG_SUFFIX) {
                self.boards.insert(board.to_string());
            } else if path.starts_with(&shields_dir)
                && path.extension().and_then(|e| e.to_str()) == Some(OVERLAY_EXT)
            {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    self.shields.insert(stem.to_string());
                }
            }
        }
    }

    pub fn is_permissive(&self) -> bool {
        self.permissive
    }

    /// An axis with no known ids at all is not validated.
    pub fn has_board(&self, board: &str) -> bool {
        self.permissive || self.boards.is_empty() || self.boards.contains(board)
    }

    pub fn has_shield(&self, shield: &str) -> bool {
        self.permissive || self.shields.is_empty() || self.shields.contains(shield)
    }

    pub fn boards(&self) -> impl Iterator<Item = &String> {
        self.boards.iter()
    }

    pub fn shields(&self) -> impl Iterator<Item = &String> {
        self.shields.iter()
    }
}
