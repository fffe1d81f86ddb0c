//! Types for emulation test runs.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failure to run an emulated executable to completion.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("scenario `{scenario}` exceeded the {}s run limit", .limit.as_secs())]
    Timeout { scenario: String, limit: Duration },

    #[error("scenario `{scenario}` crashed ({})", describe_exit(.code))]
    Crashed { scenario: String, code: Option<i32> },

    #[error("failed to start `{}` for scenario `{scenario}`: {message}", .executable.display())]
    Spawn {
        scenario: String,
        executable: PathBuf,
        message: String,
    },
}

/// Terminal state of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ScenarioOutcome {
    /// Filtered events equal the snapshot.
    Pass,
    /// Filtered events differ from the snapshot.
    ///
    /// `accepted` is set when the snapshot was overwritten with the new
    /// events. The scenario still counts as failed for this run.
    Mismatch { diff: String, accepted: bool },
    BuildError { message: String },
    RunTimeout { message: String },
    RunError { message: String },
    /// Marked pending; not built or run.
    Pending,
}

impl ScenarioOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, ScenarioOutcome::Pass)
    }

    /// True for every state that fails the invocation.
    pub fn is_failure(&self) -> bool {
        !matches!(self, ScenarioOutcome::Pass | ScenarioOutcome::Pending)
    }

    /// Short status label.
    pub fn label(&self) -> &'static str {
        match self {
            ScenarioOutcome::Pass => "pass",
            ScenarioOutcome::Mismatch { .. } => "diff",
            ScenarioOutcome::BuildError { .. } => "build-error",
            ScenarioOutcome::RunTimeout { .. } => "run-timeout",
            ScenarioOutcome::RunError { .. } => "run-error",
            ScenarioOutcome::Pending => "pending",
        }
    }
}

impl From<RunError> for ScenarioOutcome {
    fn from(err: RunError) -> Self {
        let message = err.to_string();
        match err {
            RunError::Timeout { .. } => ScenarioOutcome::RunTimeout { message },
            RunError::Crashed { .. } | RunError::Spawn { .. } => ScenarioOutcome::RunError { message },
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Result of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario id, relative to the test root
    pub id: String,

    #[serde(flatten)]
    pub outcome: ScenarioOutcome,

    /// Number of filtered events compared
    pub events: usize,

    /// Time spent building and running (in milliseconds for JSON)
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
}

/// Results of a test invocation, in scenario order.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub scenarios: Vec<ScenarioResult>,

    /// Total time (in milliseconds for JSON)
    #[serde(serialize_with = "serialize_duration_ms")]
    pub elapsed: Duration,
}

impl TestReport {
    /// True iff every scenario passed or is pending.
    pub fn success(&self) -> bool {
        self.scenarios.iter().all(|s| !s.outcome.is_failure())
    }

    pub fn passed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.outcome.is_pass()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.outcome.is_failure()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.scenarios
            .iter()
            .filter(|s| s.outcome == ScenarioOutcome::Pending)
            .count()
    }
}

/// Options for the test command.
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    /// Scenario directories or ids (empty = discover all)
    pub scenarios: Vec<String>,

    /// Reuse previously built executables
    pub no_build: bool,

    /// Overwrite snapshots with the new events on mismatch
    pub auto_accept: bool,

    /// Number of scenarios run in parallel
    pub jobs: Option<usize>,

    /// Echo the full captured streams
    pub verbose: bool,
}
