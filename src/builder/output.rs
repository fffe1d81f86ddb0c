//! Locating and placing build output.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::variant::ArtifactName;
use crate::util::fs;

/// Directory under a job's build directory holding the binaries.
pub const ZEPHYR_DIR: &str = "zephyr";

/// File stem of every binary the firmware build produces.
pub const BINARY_STEM: &str = "zmk";

/// Which binaries a build may produce, and where they end up.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    /// Extensions in order of preference
    pub formats: Vec<String>,

    /// Placement directory; `None` leaves the binary in the build tree
    pub output_dir: Option<PathBuf>,
}

impl OutputSpec {
    /// Firmware images: `primary`, falling back to `fallback`.
    pub fn firmware(primary: &str, fallback: &str, output_dir: impl Into<PathBuf>) -> Self {
        OutputSpec {
            formats: vec![primary.to_string(), fallback.to_string()],
            output_dir: Some(output_dir.into()),
        }
    }

    /// The emulator executable, used in place.
    pub fn executable() -> Self {
        OutputSpec {
            formats: vec!["exe".to_string()],
            output_dir: None,
        }
    }

    /// Every candidate path, in preference order.
    pub fn candidates(&self, build_dir: &Path) -> Vec<PathBuf> {
        let dir = build_dir.join(ZEPHYR_DIR);
        self.formats
            .iter()
            .map(|ext| dir.join(format!("{}.{}", BINARY_STEM, ext)))
            .collect()
    }

    /// Delete binaries left in `build_dir` by an earlier build.
    pub fn clear_stale(&self, build_dir: &Path) -> Result<()> {
        for path in self.candidates(build_dir) {
            fs::remove_file_if_exists(&path)?;
        }
        Ok(())
    }

    /// First existing candidate and its format.
    pub fn locate(&self, build_dir: &Path) -> Option<(PathBuf, String)> {
        self.candidates(build_dir)
            .into_iter()
            .zip(&self.formats)
            .find(|(path, _)| path.is_file())
            .map(|(path, ext)| (path, ext.clone()))
    }

    /// Copy `binary` into the output directory as `<artifact>.<format>`.
    ///
    /// Returns the final location. Without an output directory the binary
    /// stays where it is.
    pub fn place(&self, binary: &Path, artifact: &ArtifactName, format: &str) -> Result<PathBuf> {
        match &self.output_dir {
            Some(dir) => {
                let dest = dir.join(artifact.file_name(format));
                fs::copy_atomic(binary, &dest)?;
                Ok(dest)
            }
            None => Ok(binary.to_path_buf()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_prefers_primary_format() {
        let tmp = TempDir::new().unwrap();
        let spec = OutputSpec::firmware("uf2", "bin", tmp.path().join("firmware"));
        touch(&tmp.path().join("zephyr/zmk.uf2"), "uf2");
        touch(&tmp.path().join("zephyr/zmk.bin"), "bin");

        let (path, ext) = spec.locate(tmp.path()).unwrap();
        assert_eq!(ext, "uf2");
        assert!(path.ends_with("zephyr/zmk.uf2"));
    }

    #[test]
    fn test_falls_back_to_secondary_format() {
        let tmp = TempDir::new().unwrap();
        let spec = OutputSpec::firmware("uf2", "bin", tmp.path().join("firmware"));
        touch(&tmp.path().join("zephyr/zmk.bin"), "bin");

        assert_eq!(spec.locate(tmp.path()).unwrap().1, "bin");
    }

    #[test]
    fn test_nothing_to_locate() {
        let tmp = TempDir::new().unwrap();
        let spec = OutputSpec::firmware("uf2", "bin", tmp.path().join("firmware"));
        assert!(spec.locate(tmp.path()).is_none());
        assert_eq!(spec.candidates(tmp.path()).len(), 2);
    }

    #[test]
    fn test_clear_stale_removes_every_candidate() {
        let tmp = TempDir::new().unwrap();
        let spec = OutputSpec::firmware("uf2", "bin", tmp.path().join("firmware"));
        touch(&tmp.path().join("zephyr/zmk.uf2"), "old");
        touch(&tmp.path().join("zephyr/zmk.bin"), "old");
        touch(&tmp.path().join("zephyr/zephyr.dts"), "keep");

        spec.clear_stale(tmp.path()).unwrap();
        assert!(spec.locate(tmp.path()).is_none());
        assert!(tmp.path().join("zephyr/zephyr.dts").is_file());

        // Nothing left to remove is fine.
        spec.clear_stale(tmp.path()).unwrap();
    }

    #[test]
    fn test_place_names_by_artifact() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("firmware");
        let spec = OutputSpec::firmware("uf2", "bin", &out);
        let binary = tmp.path().join("zephyr/zmk.uf2");
        touch(&binary, "new");
        touch(&out.join("corne_left-nice_nano_v2.uf2"), "old");

        let placed = spec
            .place(&binary, &ArtifactName::new("corne_left-nice_nano_v2"), "uf2")
            .unwrap();
        assert_eq!(placed, out.join("corne_left-nice_nano_v2.uf2"));
        assert_eq!(std::fs::read_to_string(placed).unwrap(), "new");
    }

    #[test]
    fn test_executable_stays_in_place() {
        let tmp = TempDir::new().unwrap();
        let binary = tmp.path().join("zephyr/zmk.exe");
        touch(&binary, "#!/bin/sh\n");

        let spec = OutputSpec::executable();
        let placed = spec.place(&binary, &ArtifactName::new("t"), "exe").unwrap();
        assert_eq!(placed, binary);
    }
}
