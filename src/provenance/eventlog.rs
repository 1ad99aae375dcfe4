//! TR-015: Append-only JSONL run journal.
//!
//! One line per event in `<state_dir>/events.jsonl`. Journal failures are
//! logged and never affect the run's outcome.

use crate::core::types::{Operation, OperationResult, RunEvent, RunReport, TimestampedEvent};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// ISO 8601 UTC timestamp with second precision.
pub fn now_iso8601() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_utc(secs)
}

/// Format seconds since the Unix epoch as `YYYY-MM-DDTHH:MM:SSZ`.
fn format_utc(secs: u64) -> String {
    let (y, m, d) = civil_from_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        y,
        m,
        d,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

/// Generate a run ID.
pub fn generate_run_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("r-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Path of the journal within the state directory.
pub fn event_log_path(state_dir: &Path) -> PathBuf {
    state_dir.join("events.jsonl")
}

/// Append one event to the journal, creating the state directory if needed.
pub fn append_event(state_dir: &Path, event: RunEvent) -> Result<(), String> {
    std::fs::create_dir_all(state_dir)
        .map_err(|e| format!("cannot create state dir {}: {}", state_dir.display(), e))?;

    let te = TimestampedEvent {
        ts: now_iso8601(),
        event,
    };
    let json = serde_json::to_string(&te).map_err(|e| format!("JSON serialize error: {}", e))?;

    let path = event_log_path(state_dir);
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("cannot open journal {}: {}", path.display(), e))?;

    writeln!(file, "{}", json).map_err(|e| format!("write error: {}", e))
}

/// Journal handle for a single run.
#[derive(Debug, Clone)]
pub struct Journal {
    state_dir: Option<PathBuf>,
    run_id: String,
}

impl Journal {
    /// A journal writing under `state_dir`.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: Some(state_dir.into()),
            run_id: generate_run_id(),
        }
    }

    /// A journal that records nothing.
    pub fn disabled() -> Self {
        Self {
            state_dir: None,
            run_id: generate_run_id(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn record(&self, event: RunEvent) {
        let Some(ref dir) = self.state_dir else {
            return;
        };
        if let Err(e) = append_event(dir, event) {
            tracing::warn!(error = %e, "journal write failed");
        }
    }

    pub fn run_started(&self, action: &str, environments: Vec<String>, plan_digest: &str) {
        self.record(RunEvent::RunStarted {
            run_id: self.run_id.clone(),
            action: action.to_string(),
            environments,
            plan_digest: plan_digest.to_string(),
            terrace_version: env!("CARGO_PKG_VERSION").to_string(),
        });
    }

    pub fn operation_started(&self, op: &Operation) {
        self.record(RunEvent::OperationStarted {
            run_id: self.run_id.clone(),
            environment: op.environment.name.clone(),
            action: op.action.to_string(),
        });
    }

    pub fn operation_finished(&self, result: &OperationResult) {
        self.record(RunEvent::OperationFinished {
            run_id: self.run_id.clone(),
            environment: result.operation.environment.name.clone(),
            action: result.operation.action.to_string(),
            status: result.status.as_str().to_string(),
            exit_code: result.exit_code,
            duration_seconds: result.duration.as_secs_f64(),
        });
    }

    pub fn run_completed(&self, report: &RunReport) {
        self.record(RunEvent::RunCompleted {
            run_id: self.run_id.clone(),
            success: report.overall_success,
            interrupted: report.interrupted,
            failed_environments: report
                .failed_environments()
                .into_iter()
                .map(str::to_string)
                .collect(),
        });
    }
}
