//! Toolchain abstraction.
//!
//! A [`Toolchain`] only knows how to turn a job into a command line. Running
//! the command and locating its output is the executor's business, which
//! keeps toolchains trivially replaceable in tests.

use std::path::{Path, PathBuf};

use crate::core::job::BuildJob;
use crate::util::process::ProcessBuilder;

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run (e.g., "west")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Convert into a runnable process.
    pub fn into_process(self) -> ProcessBuilder {
        let mut pb = ProcessBuilder::new(&self.program).args(&self.args);
        for (key, value) in &self.env {
            pb = pb.env(key, value);
        }
        pb
    }
}

/// Something that can build one firmware variant.
pub trait Toolchain: Send + Sync {
    /// Short name for log lines.
    fn name(&self) -> &str;

    /// The command building `job` into `build_dir`.
    ///
    /// The executor expects binaries under `<build_dir>/zephyr/`.
    fn build_command(&self, job: &BuildJob, build_dir: &Path) -> CommandSpec;
}

/// The west meta-tool driving a Zephyr/ZMK build.
#[derive(Debug, Clone)]
pub struct WestToolchain {
    west: PathBuf,
    app_dir: PathBuf,
    pristine: bool,
}

impl WestToolchain {
    pub fn new(west: impl Into<PathBuf>, app_dir: impl Into<PathBuf>) -> Self {
        WestToolchain {
            west: west.into(),
            app_dir: app_dir.into(),
            pristine: true,
        }
    }

    /// Always start from an empty build directory (`-p`).
    pub fn pristine(mut self, pristine: bool) -> Self {
        self.pristine = pristine;
        self
    }
}

impl Toolchain for WestToolchain {
    fn name(&self) -> &str {
        "west"
    }

    fn build_command(&self, job: &BuildJob, build_dir: &Path) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.west).arg("build");
        if self.pristine {
            cmd = cmd.arg("-p");
        }

        cmd = cmd
            .arg("-s")
            .arg(self.app_dir.display().to_string())
            .arg("-d")
            .arg(build_dir.display().to_string())
            .arg("-b")
            .arg(job.variant.board.as_str());

        if let Some(snippet) = &job.variant.snippet {
            cmd = cmd.arg("-S").arg(snippet.as_str());
        }

        // Everything after `--` goes to CMake.
        cmd = cmd.arg("--");
        if let Some(config_dir) = &job.config_dir {
            cmd = cmd.arg(format!("-DZMK_CONFIG={}", config_dir.display()));
        }
        if let Some(shield) = &job.variant.shield {
            cmd = cmd.arg(format!("-DSHIELD={}", shield));
        }
        if !job.conf_overlays.is_empty() {
            let files: Vec<String> = job
                .conf_overlays
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            cmd = cmd.arg(format!("-DEXTRA_CONF_FILE={}", files.join(";")));
        }

        cmd.args(job.definitions.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variant::Variant;

    #[test]
    fn test_west_command_minimal() {
        let job = BuildJob::new(Variant::new("nice_nano_v2"));
        let cmd = WestToolchain::new("west", "/ws/zmk/app")
            .build_command(&job, Path::new("/ws/build/nice_nano_v2"));

        assert_eq!(cmd.program, PathBuf::from("west"));
        assert_eq!(
            cmd.args,
            vec![
                "build",
                "-p",
                "-s",
                "/ws/zmk/app",
                "-d",
                "/ws/build/nice_nano_v2",
                "-b",
                "nice_nano_v2",
                "--"
            ]
        );
    }

    #[test]
    fn test_west_command_full() {
        let job = BuildJob::new(
            Variant::new("xiao_ble")
                .with_shield("corne_left nice_view_adapter")
                .with_snippet("studio-rpc-usb-uart"),
        )
        .with_config_dir("/ws/config")
        .with_overlay("/ws/config/combos.conf")
        .with_overlay("/ws/config/extra.conf")
        .with_definitions(["-DCONFIG_ZMK_STUDIO=y"]);

        let cmd = WestToolchain::new("west", "/ws/zmk/app")
            .pristine(false)
            .build_command(&job, Path::new("/ws/build/x"));

        assert!(!cmd.args.contains(&"-p".to_string()));
        let tail: Vec<&str> = cmd
            .args
            .iter()
            .skip_while(|a| a.as_str() != "-S")
            .map(String::as_str)
            .collect();
        assert_eq!(
            tail,
            vec![
                "-S",
                "studio-rpc-usb-uart",
                "--",
                "-DZMK_CONFIG=/ws/config",
                "-DSHIELD=corne_left nice_view_adapter",
                "-DEXTRA_CONF_FILE=/ws/config/combos.conf;/ws/config/extra.conf",
                "-DCONFIG_ZMK_STUDIO=y",
            ]
        );
    }

    #[test]
    fn test_command_spec_into_process() {
        let pb = CommandSpec::new("west")
            .args(["build", "-b", "b1"])
            .env("ZEPHYR_BASE", "/ws/zephyr")
            .into_process();
        assert_eq!(pb.display_command(), "west build -b b1");
    }
}
