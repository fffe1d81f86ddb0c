//! Output formatting for build results (human/JSON).

use std::fmt::Write as _;

use serde_json::json;

use crate::builder::{BuildError, BuildReport};
use crate::ops::keyforge_build::BuildPlan;

/// Toolchain stderr lines shown per failed job without `--verbose`.
const STDERR_LINES: usize = 5;

/// Output format for command reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// Machine-readable JSON output
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = OutputFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            _ => Err(OutputFormatParseError(s.to_string())),
        }
    }
}

/// Error parsing output format option.
#[derive(Debug, Clone)]
pub struct OutputFormatParseError(pub String);

impl std::fmt::Display for OutputFormatParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid output format '{}', valid values: human, json", self.0)
    }
}

impl std::error::Error for OutputFormatParseError {}

/// Format a resolved plan as JSON.
pub fn format_plan_json(plan: &BuildPlan) -> String {
    serde_json::to_string_pretty(plan)
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize plan: {}"}}"#, e))
}

/// Format a build report for display (human-readable).
pub fn format_build_report(report: &BuildReport, verbose: bool) -> String {
    let mut output = String::new();

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(built) => {
                writeln!(
                    output,
                    "  [OK]   {} -> {}",
                    outcome.job.artifact,
                    built.path.display()
                )
                .unwrap();
            }
            Err(err) => {
                writeln!(output, "  [FAIL] {}", outcome.job.artifact).unwrap();
                writeln!(output, "         {}", err).unwrap();
                if let BuildError::Toolchain { stderr, .. } = err {
                    let lines: Vec<&str> = stderr.lines().collect();
                    let start = if verbose { 0 } else { lines.len().saturating_sub(STDERR_LINES) };
                    for line in &lines[start..] {
                        writeln!(output, "         | {}", line).unwrap();
                    }
                }
            }
        }
    }

    let failed = report.failures().count();
    let status = if report.success() { "PASSED" } else { "FAILED" };
    writeln!(output).unwrap();
    writeln!(
        output,
        "Result: {} ({}/{} targets built, {} failed)",
        status,
        report.built().count(),
        report.outcomes.len(),
        failed
    )
    .unwrap();

    output
}

/// Format a build report as JSON.
pub fn format_build_report_json(report: &BuildReport) -> String {
    let jobs: Vec<serde_json::Value> = report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(built) => json!({
                "artifact": outcome.job.artifact,
                "variant": outcome.job.variant,
                "status": "ok",
                "path": built.path,
                "format": built.format,
            }),
            Err(err) => json!({
                "artifact": outcome.job.artifact,
                "variant": outcome.job.variant,
                "status": "failed",
                "error": err.kind(),
                "message": err.to_string(),
            }),
        })
        .collect();

    let value = json!({
        "success": report.success(),
        "duration_ms": report.elapsed.as_millis() as u64,
        "jobs": jobs,
    });
    serde_json::to_string_pretty(&value)
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize report: {}"}}"#, e))
}
