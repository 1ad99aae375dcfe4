//! TR-008: Result aggregation and report rendering.

use super::types::{Action, OperationResult, OperationStatus, RunReport};
use std::fmt::Write as _;

/// Every operation succeeded (or there were none).
pub const EXIT_OK: i32 = 0;
/// At least one operation failed, was skipped, or was interrupted.
pub const EXIT_FAILED: i32 = 1;
/// Invalid invocation or configuration; nothing ran.
pub const EXIT_INVALID: i32 = 2;

/// Fold results into a report. `overall_success` is the AND of every
/// `exit_code == 0`, so an empty run is a success.
pub fn aggregate(action: Action, results: Vec<OperationResult>) -> RunReport {
    let overall_success = results.iter().all(OperationResult::success);
    let interrupted = results
        .iter()
        .any(|r| r.status == OperationStatus::Interrupted);
    RunReport {
        action,
        results,
        overall_success,
        interrupted,
    }
}

impl RunReport {
    /// 0 on success, 1 otherwise, however many environments failed.
    pub fn exit_code(&self) -> i32 {
        if self.overall_success {
            EXIT_OK
        } else {
            EXIT_FAILED
        }
    }

    /// Environments with any unsuccessful operation, in execution order.
    pub fn failed_environments(&self) -> Vec<&str> {
        let mut failed: Vec<&str> = Vec::new();
        for r in self.results.iter().filter(|r| !r.success()) {
            let name = r.operation.environment.name.as_str();
            if !failed.contains(&name) {
                failed.push(name);
            }
        }
        failed
    }

    /// Number of distinct environments in the report.
    pub fn environment_count(&self) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        for r in &self.results {
            let name = r.operation.environment.name.as_str();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen.len()
    }
}

/// Human-readable summary: one line per operation, then the captured output
/// of everything that failed. Quiet operations only appear in the detail
/// section when they fail.
pub fn render_human(report: &RunReport) -> String {
    let mut out = String::new();
    let width = report
        .results
        .iter()
        .map(|r| r.operation.environment.name.len())
        .max()
        .unwrap_or(0);

    let _ = writeln!(out, "Summary ({}):", report.action);
    for r in &report.results {
        let code = match (r.status, r.exit_code) {
            (OperationStatus::Failed, Some(c)) => format!(" exit {}", c),
            _ => String::new(),
        };
        let _ = writeln!(
            out,
            "  {:<width$}  {:<9}  {}{} ({:.1}s)",
            r.operation.environment.name,
            r.operation.action.as_str(),
            r.status,
            code,
            r.duration.as_secs_f64(),
            width = width
        );
    }

    for r in report
        .results
        .iter()
        .filter(|r| r.status == OperationStatus::Failed)
    {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "--- {} {} output ---",
            r.operation.environment.name, r.operation.action
        );
        if r.operation.quiet && !r.stdout.is_empty() {
            out.push_str(&String::from_utf8_lossy(&r.stdout));
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        if r.stderr.is_empty() {
            let _ = writeln!(out, "(no stderr)");
        } else {
            out.push_str(&String::from_utf8_lossy(&r.stderr));
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }

    let _ = writeln!(out);
    if report.overall_success {
        let _ = writeln!(
            out,
            "{} complete: {} environment(s), {} operation(s).",
            report.action,
            report.environment_count(),
            report.results.len()
        );
    } else {
        let failed = report.failed_environments();
        let verb = if report.interrupted {
            "interrupted"
        } else {
            "failed"
        };
        let _ = writeln!(
            out,
            "{} {}: {} of {} environment(s) unsuccessful ({}).",
            report.action,
            verb,
            failed.len(),
            report.environment_count(),
            failed.join(", ")
        );
    }
    out
}

/// Pretty JSON of the whole report.
pub fn render_json(report: &RunReport) -> Result<String, String> {
    serde_json::to_string_pretty(report).map_err(|e| format!("JSON serialize error: {}", e))
}
