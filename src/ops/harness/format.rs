//! Output formatting for test reports (human/JSON).

use std::fmt::Write as _;

use super::types::{ScenarioOutcome, TestReport};

/// Format a test report for display (human-readable).
pub fn format_report(report: &TestReport) -> String {
    let mut output = String::new();

    for scenario in &report.scenarios {
        let status = match &scenario.outcome {
            ScenarioOutcome::Pass => "[PASS]",
            ScenarioOutcome::Pending => "[SKIP]",
            _ => "[FAIL]",
        };
        writeln!(output, "  {} {} ({:.2?})", status, scenario.id, scenario.duration).unwrap();

        match &scenario.outcome {
            ScenarioOutcome::Mismatch { diff, accepted } => {
                for line in diff.lines() {
                    writeln!(output, "      {}", line).unwrap();
                }
                if *accepted {
                    writeln!(output, "      snapshot updated").unwrap();
                }
            }
            ScenarioOutcome::BuildError { message }
            | ScenarioOutcome::RunTimeout { message }
            | ScenarioOutcome::RunError { message } => {
                writeln!(output, "      {}: {}", scenario.outcome.label(), message).unwrap();
            }
            ScenarioOutcome::Pass | ScenarioOutcome::Pending => {}
        }
    }

    writeln!(output).unwrap();
    let status = if report.success() { "PASSED" } else { "FAILED" };
    writeln!(
        output,
        "Result: {} ({} passed, {} failed, {} pending)",
        status,
        report.passed_count(),
        report.failed_count(),
        report.pending_count()
    )
    .unwrap();
    writeln!(output, "Total time: {:.2?}", report.elapsed).unwrap();

    output
}

/// Format a test report as JSON.
pub fn format_report_json(report: &TestReport) -> String {
    let value = serde_json::json!({
        "success": report.success(),
        "passed": report.passed_count(),
        "failed": report.failed_count(),
        "pending": report.pending_count(),
        "report": report,
    });
    serde_json::to_string_pretty(&value)
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize result: {}"}}"#, e))
}
