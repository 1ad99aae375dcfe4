//! TR-006: Executor that runs planned operations one after another.
//!
//! plan → for each operation: purge cache (init) → codegen → transport → result → journal
//!
//! Operations run strictly in input order. A failure skips the rest of the
//! same environment's chain; other environments still run unless the
//! failure policy is `stop_on_first`. An interrupt lets the running child
//! wind down (the runner kills it once its grace period is spent) and marks
//! everything after it as interrupted.

use super::codegen::{self, ToolSettings};
use super::parser::is_local_subpath;
use super::types::*;
use crate::provenance::eventlog::Journal;
use crate::transport::{CancelFlag, CommandRunner};
use std::path::Path;
use std::time::Instant;

/// Runs operations through an injected [`CommandRunner`].
pub struct Executor<'a, R: CommandRunner> {
    runner: &'a R,
    tool: &'a ToolSettings,
    cache_dir: &'a str,
    failure_policy: FailurePolicy,
    cancel: CancelFlag,
    journal: &'a Journal,
}

impl<'a, R: CommandRunner> Executor<'a, R> {
    pub fn new(runner: &'a R, tool: &'a ToolSettings, journal: &'a Journal) -> Self {
        Self {
            runner,
            tool,
            cache_dir: ".terraform",
            failure_policy: FailurePolicy::default(),
            cancel: CancelFlag::new(),
            journal,
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: &'a str) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute `operations` in order. Results come back in the same order,
    /// one per operation.
    pub fn execute(&self, operations: Vec<Operation>, parallelism: u32) -> Vec<OperationResult> {
        let mut results = Vec::with_capacity(operations.len());
        let mut failed_env: Option<String> = None;
        let mut halted = false;

        for op in operations {
            if self.cancel.is_cancelled() {
                results.push(self.finish(OperationResult::not_run(op, OperationStatus::Interrupted)));
                continue;
            }
            if halted || failed_env.as_deref() == Some(op.environment.name.as_str()) {
                tracing::info!(
                    environment = %op.environment.name,
                    action = %op.action,
                    "skipped after earlier failure"
                );
                results.push(self.finish(OperationResult::not_run(op, OperationStatus::Skipped)));
                continue;
            }

            let result = self.run_one(op, parallelism);
            if !result.success() {
                tracing::warn!(
                    environment = %result.operation.environment.name,
                    action = %result.operation.action,
                    exit_code = ?result.exit_code,
                    "operation failed"
                );
                failed_env = Some(result.operation.environment.name.clone());
                if self.failure_policy == FailurePolicy::StopOnFirst {
                    halted = true;
                }
            }
            results.push(self.finish(result));
        }

        results
    }

    fn finish(&self, result: OperationResult) -> OperationResult {
        self.journal.operation_finished(&result);
        result
    }

    fn run_one(&self, op: Operation, parallelism: u32) -> OperationResult {
        self.journal.operation_started(&op);
        let start = Instant::now();

        if op.action.purges_cache() {
            if let Err(e) = purge_cache(&op.environment.path, self.cache_dir) {
                let mut result = OperationResult::not_run(op, OperationStatus::Failed);
                result.stderr = e.into_bytes();
                result.duration = start.elapsed();
                return result;
            }
        }

        let invocation = codegen::invocation(&op, self.tool, parallelism);
        let outcome = self.runner.run(&invocation, &self.cancel);
        let duration = start.elapsed();

        match outcome {
            Ok(out) => {
                let status = if out.interrupted {
                    OperationStatus::Interrupted
                } else if out.success() {
                    OperationStatus::Succeeded
                } else {
                    OperationStatus::Failed
                };
                OperationResult {
                    operation: op,
                    status,
                    exit_code: if out.interrupted { None } else { out.exit_code },
                    stdout: out.stdout,
                    stderr: out.stderr,
                    duration,
                }
            }
            Err(e) => {
                let mut result = OperationResult::not_run(op, OperationStatus::Failed);
                result.stderr = e.to_string().into_bytes();
                result.duration = duration;
                result
            }
        }
    }
}

/// Remove the environment's local cache directory. Missing is fine, so
/// repeated inits converge on the same state.
fn purge_cache(env_dir: &Path, cache_dir: &str) -> Result<(), String> {
    if !is_local_subpath(Path::new(cache_dir)) {
        return Err(format!(
            "refusing to purge '{}': cache_dir must stay inside {}",
            cache_dir,
            env_dir.display()
        ));
    }
    let path = env_dir.join(cache_dir);
    if !path.exists() {
        return Ok(());
    }
    tracing::info!(path = %path.display(), "removing cached state before init");
    std::fs::remove_dir_all(&path)
        .map_err(|e| format!("cannot remove {}: {}", path.display(), e))
}
