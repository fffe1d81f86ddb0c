//! Test fixtures for common test scenarios.
//!
//! This module provides generators for on-disk config repositories and
//! emulation test scenarios.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A combo artifact with three combos over positions 1..4.
pub const SAMPLE_COMBOS: &str = r#"/ {
    combos {
        compatible = "zmk,combos";
        combo_esc {
            key-positions = <1 2>;
            bindings = <&kp ESC>;
        };
        combo_tab {
            key-positions = <1 3 4>;
            bindings = <&kp TAB>;
        };
    };
};
"#;

/// Fixture for a firmware config repository.
#[derive(Debug, Clone, Default)]
pub struct ProjectFixture {
    /// Files relative to the project root -> content.
    pub files: BTreeMap<PathBuf, String>,
}

impl ProjectFixture {
    /// Create an empty project fixture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an arbitrary file.
    pub fn file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Set `build.yaml`.
    pub fn matrix(self, yaml: &str) -> Self {
        self.file("build.yaml", yaml)
    }

    /// Set `keyforge.toml`.
    pub fn config(self, toml: &str) -> Self {
        self.file("keyforge.toml", toml)
    }

    /// Set the combo artifact at its default location.
    pub fn combos(self, dtsi: &str) -> Self {
        self.file("config/combos.dtsi", dtsi)
    }

    /// Add a board definition under `boards/`.
    pub fn board(self, name: &str) -> Self {
        self.file(format!("boards/arm/{name}/{name}_defconfig"), "CONFIG_SOC_SERIES_NRF52X=y\n")
    }

    /// Add a shield overlay under `boards/shields/`.
    pub fn shield(self, name: &str) -> Self {
        self.file(format!("boards/shields/{name}/{name}.overlay"), "/ { };\n")
    }

    /// Add an emulation test scenario.
    pub fn scenario(mut self, scenario: &ScenarioFixture) -> Self {
        let dir = PathBuf::from("tests").join(&scenario.id);
        self.files.insert(dir.join("events.patterns"), scenario.patterns.clone());
        if let Some(snapshot) = &scenario.snapshot {
            self.files.insert(dir.join("keycode_events.snapshot"), snapshot.clone());
        }
        if scenario.pending {
            self.files.insert(dir.join("pending"), String::new());
        }
        self
    }

    /// Write the fixture below `base_path`, returning the project root.
    pub fn write_to(&self, base_path: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(base_path)?;
        for (path, content) in &self.files {
            let full = base_path.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full, content)?;
        }
        Ok(base_path.to_path_buf())
    }
}

/// Fixture for one emulation test scenario.
#[derive(Debug, Clone)]
pub struct ScenarioFixture {
    /// Path below the test root, e.g. `combos/basic`
    pub id: String,
    pub patterns: String,
    pub snapshot: Option<String>,
    pub pending: bool,
}

impl ScenarioFixture {
    /// A scenario keeping keycode press/release lines.
    pub fn keycodes(id: impl Into<String>) -> Self {
        ScenarioFixture {
            id: id.into(),
            patterns: "s/.*hid_listener_keycode_//p\n".to_string(),
            snapshot: None,
            pending: false,
        }
    }

    pub fn with_patterns(mut self, patterns: impl Into<String>) -> Self {
        self.patterns = patterns.into();
        self
    }

    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    pub fn pending(mut self) -> Self {
        self.pending = true;
        self
    }
}
