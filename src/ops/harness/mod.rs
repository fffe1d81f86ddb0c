//! Emulation test harness.
//!
//! A scenario is a directory holding a pattern set and a snapshot. The
//! harness builds the scenario for the emulation board, runs it, filters
//! the captured events and compares them to the snapshot.

pub mod diff;
pub mod events;
pub mod format;
pub mod patterns;
pub mod run;
pub mod snapshot;
pub mod types;

use std::path::Path;

use anyhow::{bail, Result};

use crate::builder::WestToolchain;
use crate::ops::keyforge_build::west_toolchain;
use crate::util::config::Config;
use crate::util::diagnostic::suggestions;

pub use format::{format_report, format_report_json};
pub use run::{discover_scenarios, select_scenarios, Harness, HarnessSettings, Scenario};
pub use types::{RunError, ScenarioOutcome, ScenarioResult, TestOptions, TestReport};

/// Run the selected scenarios with west as the toolchain.
pub fn run_tests(root: &Path, config: &Config, opts: &TestOptions) -> Result<TestReport> {
    let test_root = config.test.root(root);
    let scenarios = select_scenarios(root, &test_root, &opts.scenarios, config.test.patterns_file())?;
    if scenarios.is_empty() {
        bail!("no test scenarios found under {}\n{}", test_root.display(), suggestions::NO_SCENARIOS);
    }
    tracing::info!("running {} scenario(s)", scenarios.len());

    let toolchain = if opts.no_build {
        WestToolchain::new(config.build.west(), config.build.app_dir(root))
    } else {
        west_toolchain(root, config)?
    };
    let settings = HarnessSettings::from_config(&config.test, &config.build.build_dir(root));
    let mut opts = opts.clone();
    opts.jobs = opts.jobs.or(config.test.jobs);

    Harness::new(&toolchain, settings, opts).run_all(&scenarios)
}
