//! Scenario discovery and execution.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::builder::{BuildExecutor, OutputSpec, Toolchain};
use crate::core::job::BuildJob;
use crate::core::variant::{ArtifactName, Variant};
use crate::ops::harness::diff::unified_diff;
use crate::ops::harness::events::{parse_events, EventRecord};
use crate::ops::harness::patterns::PatternSet;
use crate::ops::harness::snapshot;
use crate::ops::harness::types::{
    RunError, ScenarioOutcome, ScenarioResult, TestOptions, TestReport,
};
use crate::util::config::TestConfig;
use crate::util::fs;
use crate::util::process::{ProcessBuilder, TimedOutput};

/// Marker file that skips a scenario.
pub const PENDING_MARKER: &str = "pending";

/// Unfiltered, prefix-stripped event log written next to the build.
pub const FULL_LOG: &str = "keycode_events_full.log";

/// Filtered event log written next to the build.
pub const FILTERED_LOG: &str = "keycode_events.log";

/// A test scenario directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Path relative to the test root, `/`-separated
    pub id: String,
    pub dir: PathBuf,
    pub pending: bool,
}

impl Scenario {
    fn at(test_root: &Path, dir: &Path) -> Self {
        let id = match dir.strip_prefix(test_root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            _ => dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.display().to_string()),
        };
        Scenario {
            id,
            dir: dir.to_path_buf(),
            pending: dir.join(PENDING_MARKER).exists(),
        }
    }
}

/// Every scenario below `dir`, sorted by id.
pub fn discover_scenarios(test_root: &Path, dir: &Path, patterns_file: &str) -> Vec<Scenario> {
    let mut scenarios: Vec<Scenario> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == patterns_file)
        .filter_map(|e| e.path().parent().map(|p| Scenario::at(test_root, p)))
        .collect();
    scenarios.sort_by(|a, b| a.id.cmp(&b.id));
    scenarios.dedup_by(|a, b| a.id == b.id);
    scenarios
}

/// Scenarios named on the command line, or all of them.
///
/// A name containing glob characters matches scenario ids. Other names are
/// looked up below the test root first, then as a path. Naming a directory
/// that holds several scenarios selects all of them.
pub fn select_scenarios(
    root: &Path,
    test_root: &Path,
    names: &[String],
    patterns_file: &str,
) -> Result<Vec<Scenario>> {
    if names.is_empty() {
        return Ok(discover_scenarios(test_root, test_root, patterns_file));
    }

    let mut selected: Vec<Scenario> = Vec::new();
    for name in names {
        if name.contains(&['*', '?', '['][..]) {
            let pattern = glob::Pattern::new(name)
                .with_context(|| format!("invalid scenario pattern `{}`", name))?;
            let matched: Vec<Scenario> = discover_scenarios(test_root, test_root, patterns_file)
                .into_iter()
                .filter(|s| pattern.matches(&s.id))
                .collect();
            if matched.is_empty() {
                bail!("no test scenario matches `{}`", name);
            }
            for scenario in matched {
                if !selected.iter().any(|s| s.id == scenario.id) {
                    selected.push(scenario);
                }
            }
            continue;
        }

        let candidates = [test_root.join(name), root.join(name), PathBuf::from(name)];
        let dir = candidates
            .iter()
            .find(|p| p.is_dir())
            .with_context(|| format!("no test scenario `{}`", name))?;

        let found = discover_scenarios(test_root, dir, patterns_file);
        if found.is_empty() {
            bail!(
                "`{}` contains no test scenario\n\
                 hint: a scenario is a directory containing `{}`",
                dir.display(),
                patterns_file
            );
        }
        for scenario in found {
            if !selected.iter().any(|s| s.id == scenario.id) {
                selected.push(scenario);
            }
        }
    }
    Ok(selected)
}

/// Locations and limits shared by every scenario.
#[derive(Debug, Clone)]
pub struct HarnessSettings {
    /// Test builds go to `<build_root>/<scenario-id>/`
    pub build_root: PathBuf,
    pub board: String,
    pub timeout: Duration,
    pub run_args: Vec<String>,
    pub patterns_file: String,
    pub snapshot_file: String,
}

impl HarnessSettings {
    pub fn from_config(config: &TestConfig, build_dir: &Path) -> Self {
        HarnessSettings {
            build_root: build_dir.join("tests"),
            board: config.board().to_string(),
            timeout: config.timeout(),
            run_args: config.run_args.clone(),
            patterns_file: config.patterns_file().to_string(),
            snapshot_file: config.snapshot_file().to_string(),
        }
    }
}

/// Builds, runs and checks scenarios.
pub struct Harness<'a> {
    toolchain: &'a dyn Toolchain,
    settings: HarnessSettings,
    opts: TestOptions,
}

impl<'a> Harness<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, settings: HarnessSettings, opts: TestOptions) -> Self {
        Harness {
            toolchain,
            settings,
            opts,
        }
    }

    /// Run every scenario, at most `opts.jobs` at a time.
    ///
    /// All pattern sets are loaded first, so a malformed rule fails the
    /// invocation before anything is built.
    pub fn run_all(&self, scenarios: &[Scenario]) -> Result<TestReport> {
        let start = Instant::now();

        let prepared: Vec<(&Scenario, Option<PatternSet>)> = scenarios
            .iter()
            .map(|s| {
                if s.pending {
                    Ok((s, None))
                } else {
                    PatternSet::load(&s.dir.join(&self.settings.patterns_file))
                        .map(|patterns| (s, Some(patterns)))
                        .map_err(anyhow::Error::from)
                }
            })
            .collect::<Result<_>>()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.opts.jobs.unwrap_or(0))
            .build()
            .context("failed to create test thread pool")?;

        let results: Vec<ScenarioResult> = pool.install(|| {
            prepared
                .par_iter()
                .map(|(scenario, patterns)| {
                    let result = match patterns {
                        Some(patterns) => self.run_scenario(scenario, patterns),
                        None => ScenarioResult {
                            id: scenario.id.clone(),
                            outcome: ScenarioOutcome::Pending,
                            events: 0,
                            duration: Duration::ZERO,
                        },
                    };
                    report_status(&result);
                    result
                })
                .collect()
        });

        Ok(TestReport {
            scenarios: results,
            elapsed: start.elapsed(),
        })
    }

    /// Build, run, filter and compare one scenario.
    pub fn run_scenario(&self, scenario: &Scenario, patterns: &PatternSet) -> ScenarioResult {
        let start = Instant::now();
        let (outcome, events) = match self.check(scenario, patterns) {
            Ok(checked) => checked,
            Err(outcome) => (outcome, 0),
        };
        ScenarioResult {
            id: scenario.id.clone(),
            outcome,
            events,
            duration: start.elapsed(),
        }
    }

    fn check(&self, scenario: &Scenario, patterns: &PatternSet) -> Result<(ScenarioOutcome, usize), ScenarioOutcome> {
        let executable = self.executable(scenario)?;
        let stdout = self.run(scenario, &executable)?;

        if self.opts.verbose {
            eprintln!("---- {} output ----", scenario.id);
            eprint!("{}", stdout);
        }

        let events = parse_events(&stdout);
        let filtered = patterns.apply(&events);
        self.write_logs(scenario, &events, &filtered);

        let snapshot_path = scenario.dir.join(&self.settings.snapshot_file);
        let expected = snapshot::load(&snapshot_path).map_err(|e| ScenarioOutcome::RunError {
            message: format!("{:#}", e),
        })?;

        let outcome = match unified_diff(&expected, &filtered, &self.settings.snapshot_file, "actual") {
            None => ScenarioOutcome::Pass,
            Some(diff) => {
                let accepted = self.opts.auto_accept
                    && match snapshot::accept(&snapshot_path, &filtered) {
                        Ok(()) => {
                            tracing::info!("updated snapshot {}", snapshot_path.display());
                            true
                        }
                        Err(e) => {
                            tracing::warn!("{:#}", e);
                            false
                        }
                    };
                ScenarioOutcome::Mismatch { diff, accepted }
            }
        };
        Ok((outcome, filtered.len()))
    }

    /// The scenario's emulator executable, building it unless `--no-build`.
    fn executable(&self, scenario: &Scenario) -> Result<PathBuf, ScenarioOutcome> {
        let executor = BuildExecutor::new(self.toolchain, &self.settings.build_root, OutputSpec::executable())
            .verbose(self.opts.verbose);
        let job = BuildJob::new(Variant::new(&self.settings.board))
            .with_artifact(ArtifactName::new(&scenario.id))
            .with_config_dir(&scenario.dir);

        if self.opts.no_build {
            let build_dir = executor.job_build_dir(&job);
            return OutputSpec::executable()
                .locate(&build_dir)
                .map(|(path, _)| path)
                .ok_or_else(|| ScenarioOutcome::BuildError {
                    message: format!(
                        "no executable under {}; run without --no-build first",
                        build_dir.display()
                    ),
                });
        }

        executor
            .run_job(&job)
            .map(|built| built.path)
            .map_err(|e| ScenarioOutcome::BuildError {
                message: e.to_string(),
            })
    }

    /// Run the executable under the wall-clock limit and return its stdout.
    fn run(&self, scenario: &Scenario, executable: &Path) -> Result<String, RunError> {
        let process = ProcessBuilder::new(executable)
            .args(&self.settings.run_args)
            .cwd(&scenario.dir);

        let output = process
            .exec_with_timeout(self.settings.timeout)
            .map_err(|e| RunError::Spawn {
                scenario: scenario.id.clone(),
                executable: executable.to_path_buf(),
                message: format!("{:#}", e),
            })?;

        match output {
            TimedOutput::Completed(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            TimedOutput::Completed(output) => Err(RunError::Crashed {
                scenario: scenario.id.clone(),
                code: output.status.code(),
            }),
            TimedOutput::TimedOut { .. } => Err(RunError::Timeout {
                scenario: scenario.id.clone(),
                limit: self.settings.timeout,
            }),
        }
    }

    fn write_logs(&self, scenario: &Scenario, events: &[EventRecord], filtered: &[String]) {
        let dir = self.settings.build_root.join(&scenario.id);
        let full: Vec<String> = events.iter().map(|e| e.text.clone()).collect();
        let logs = [
            (dir.join(FULL_LOG), snapshot::render(&full)),
            (dir.join(FILTERED_LOG), snapshot::render(filtered)),
        ];
        for (path, contents) in logs {
            if let Err(e) = fs::write_atomic(&path, contents.as_bytes()) {
                tracing::warn!("could not write {}: {:#}", path.display(), e);
            }
        }
    }
}

fn report_status(result: &ScenarioResult) {
    match &result.outcome {
        ScenarioOutcome::Pass => eprintln!("        PASS {}", result.id),
        ScenarioOutcome::Pending => eprintln!("     PENDING {}", result.id),
        outcome => eprintln!("        FAIL {} ({})", result.id, outcome.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ProjectFixture, ScenarioFixture, ScriptToolchain};
    use tempfile::TempDir;

    const EMULATOR: &str = r#"echo '*** Booting Zephyr OS ***'
echo '[00:00:00.000,000] <dbg> zmk: hid_listener_keycode_pressed: keycode 0x04'
echo '[00:00:00.001,000] <dbg> zmk: kscan_matrix_read: noise'
echo '[00:00:00.002,000] <dbg> zmk: hid_listener_keycode_released: keycode 0x04'"#;

    fn settings(root: &Path, timeout: Duration) -> HarnessSettings {
        HarnessSettings {
            build_root: root.join("build/tests"),
            board: "native_posix_64".to_string(),
            timeout,
            run_args: Vec::new(),
            patterns_file: "events.patterns".to_string(),
            snapshot_file: "keycode_events.snapshot".to_string(),
        }
    }

    fn project(tmp: &TempDir, scenarios: &[ScenarioFixture]) -> PathBuf {
        scenarios
            .iter()
            .fold(ProjectFixture::new(), |p, s| p.scenario(s))
            .write_to(tmp.path())
            .unwrap()
    }

    fn run(root: &Path, toolchain: &ScriptToolchain, opts: TestOptions) -> TestReport {
        let scenarios = select_scenarios(root, &root.join("tests"), &[], "events.patterns").unwrap();
        Harness::new(toolchain, settings(root, Duration::from_secs(10)), opts)
            .run_all(&scenarios)
            .unwrap()
    }

    #[test]
    fn test_discovery_is_sorted() {
        let tmp = TempDir::new().unwrap();
        let root = project(
            &tmp,
            &[
                ScenarioFixture::keycodes("b"),
                ScenarioFixture::keycodes("a/y"),
                ScenarioFixture::keycodes("a/x").pending(),
            ],
        );

        let all = discover_scenarios(&root.join("tests"), &root.join("tests"), "events.patterns");
        let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a/x", "a/y", "b"]);
        assert!(all[0].pending);
        assert!(!all[1].pending);
    }

    #[test]
    fn test_select_by_name() {
        let tmp = TempDir::new().unwrap();
        let root = project(
            &tmp,
            &[ScenarioFixture::keycodes("a/x"), ScenarioFixture::keycodes("a/y"), ScenarioFixture::keycodes("b")],
        );
        let test_root = root.join("tests");

        let picked = select_scenarios(&root, &test_root, &["a".to_string(), "a/y".to_string()], "events.patterns").unwrap();
        let ids: Vec<&str> = picked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a/x", "a/y"]);

        assert!(select_scenarios(&root, &test_root, &["missing".to_string()], "events.patterns").is_err());
    }

    #[test]
    fn test_select_by_glob() {
        let tmp = TempDir::new().unwrap();
        let root = project(
            &tmp,
            &[ScenarioFixture::keycodes("combos/a"), ScenarioFixture::keycodes("combos/b"), ScenarioFixture::keycodes("hold-tap")],
        );
        let test_root = root.join("tests");

        let picked = select_scenarios(&root, &test_root, &["combos/*".to_string()], "events.patterns").unwrap();
        let ids: Vec<&str> = picked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["combos/a", "combos/b"]);

        assert!(select_scenarios(&root, &test_root, &["macros/*".to_string()], "events.patterns").is_err());
    }

    #[test]
    fn test_accept_then_rerun_passes() {
        let tmp = TempDir::new().unwrap();
        let root = project(&tmp, &[ScenarioFixture::keycodes("keys/basic")]);
        let toolchain = ScriptToolchain::emulating(EMULATOR);

        let first = run(
            &root,
            &toolchain,
            TestOptions {
                auto_accept: true,
                ..Default::default()
            },
        );
        assert!(!first.success());
        match &first.scenarios[0].outcome {
            ScenarioOutcome::Mismatch { diff, accepted } => {
                assert!(accepted);
                assert!(diff.contains("+pressed: keycode 0x04"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let snapshot = root.join("tests/keys/basic/keycode_events.snapshot");
        assert_eq!(
            std::fs::read_to_string(&snapshot).unwrap(),
            "pressed: keycode 0x04\nreleased: keycode 0x04\n"
        );

        let second = run(&root, &toolchain, TestOptions::default());
        assert!(second.success());
        assert_eq!(second.scenarios[0].outcome, ScenarioOutcome::Pass);
        assert_eq!(second.scenarios[0].events, 2);

        let logs = root.join("build/tests/keys/basic");
        assert!(std::fs::read_to_string(logs.join(FULL_LOG)).unwrap().contains("kscan_matrix_read: noise"));
        assert_eq!(
            std::fs::read_to_string(logs.join(FILTERED_LOG)).unwrap(),
            "pressed: keycode 0x04\nreleased: keycode 0x04\n"
        );
    }

    #[test]
    fn test_mismatch_without_accept_keeps_snapshot() {
        let tmp = TempDir::new().unwrap();
        let root = project(
            &tmp,
            &[ScenarioFixture::keycodes("keys/basic").with_snapshot("pressed: keycode 0x05\n")],
        );
        let report = run(&root, &ScriptToolchain::emulating(EMULATOR), TestOptions::default());

        assert!(matches!(
            report.scenarios[0].outcome,
            ScenarioOutcome::Mismatch { accepted: false, .. }
        ));
        assert_eq!(
            std::fs::read_to_string(root.join("tests/keys/basic/keycode_events.snapshot")).unwrap(),
            "pressed: keycode 0x05\n"
        );
    }

    #[test]
    fn test_no_build_requires_executable() {
        let tmp = TempDir::new().unwrap();
        let root = project(
            &tmp,
            &[ScenarioFixture::keycodes("k").with_snapshot("pressed: keycode 0x04\nreleased: keycode 0x04\n")],
        );
        let toolchain = ScriptToolchain::emulating(EMULATOR);
        let no_build = TestOptions {
            no_build: true,
            ..Default::default()
        };

        let report = run(&root, &toolchain, no_build.clone());
        assert_eq!(report.scenarios[0].outcome.label(), "build-error");

        assert!(run(&root, &toolchain, TestOptions::default()).success());
        assert!(run(&root, &toolchain, no_build).success());
    }

    #[test]
    fn test_verbose_does_not_change_outcome() {
        let tmp = TempDir::new().unwrap();
        let root = project(
            &tmp,
            &[ScenarioFixture::keycodes("k").with_snapshot("pressed: keycode 0x04\nreleased: keycode 0x04\n")],
        );
        let toolchain = ScriptToolchain::emulating(EMULATOR);
        let filtered = root.join("build/tests/k").join(FILTERED_LOG);

        let quiet = run(&root, &toolchain, TestOptions::default());
        let quiet_log = std::fs::read_to_string(&filtered).unwrap();
        let verbose = run(
            &root,
            &toolchain,
            TestOptions {
                verbose: true,
                ..Default::default()
            },
        );

        assert_eq!(quiet.scenarios[0].outcome, ScenarioOutcome::Pass);
        assert_eq!(verbose.scenarios[0].outcome, quiet.scenarios[0].outcome);
        assert_eq!(verbose.scenarios[0].events, quiet.scenarios[0].events);
        assert_eq!(std::fs::read_to_string(&filtered).unwrap(), quiet_log);
    }

    #[test]
    fn test_failed_build_is_build_error() {
        let tmp = TempDir::new().unwrap();
        let root = project(&tmp, &[ScenarioFixture::keycodes("k")]);
        let report = run(&root, &ScriptToolchain::new("exit 1"), TestOptions::default());
        assert_eq!(report.scenarios[0].outcome.label(), "build-error");
    }

    #[test]
    fn test_pending_is_not_built() {
        let tmp = TempDir::new().unwrap();
        let root = project(&tmp, &[ScenarioFixture::keycodes("slow").pending()]);
        let report = run(&root, &ScriptToolchain::emulating(EMULATOR), TestOptions::default());

        assert!(report.success());
        assert_eq!(report.scenarios[0].outcome, ScenarioOutcome::Pending);
        assert!(!root.join("build/tests/slow").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_emulator_times_out() {
        let tmp = TempDir::new().unwrap();
        let root = project(&tmp, &[ScenarioFixture::keycodes("hang")]);
        let toolchain = ScriptToolchain::emulating("exec sleep 30");
        let scenarios = select_scenarios(&root, &root.join("tests"), &[], "events.patterns").unwrap();

        let report = Harness::new(&toolchain, settings(&root, Duration::from_millis(300)), TestOptions::default())
            .run_all(&scenarios)
            .unwrap();

        assert_eq!(report.scenarios[0].outcome.label(), "run-timeout");
    }

    #[test]
    fn test_crash_is_run_error() {
        let tmp = TempDir::new().unwrap();
        let root = project(&tmp, &[ScenarioFixture::keycodes("crash")]);
        let report = run(&root, &ScriptToolchain::emulating("echo partial; exit 3"), TestOptions::default());
        assert_eq!(report.scenarios[0].outcome.label(), "run-error");
    }

    #[test]
    fn test_malformed_patterns_abort_before_building() {
        let tmp = TempDir::new().unwrap();
        let root = project(&tmp, &[ScenarioFixture::keycodes("bad").with_patterns("s/unterminated\n")]);
        let scenarios = select_scenarios(&root, &root.join("tests"), &[], "events.patterns").unwrap();
        let toolchain = ScriptToolchain::emulating(EMULATOR);

        let err = Harness::new(&toolchain, settings(&root, Duration::from_secs(10)), TestOptions::default())
            .run_all(&scenarios)
            .unwrap_err();

        assert!(err.to_string().contains("events.patterns:1"));
        assert!(!root.join("build/tests/bad").exists());
    }
}
