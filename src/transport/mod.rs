//! TR-010: Transport for running tool invocations as subprocesses.
//!
//! The executor only sees the [`CommandRunner`] trait; the production
//! [`local::ProcessRunner`] spawns real processes and tests inject fakes.

pub mod interrupt;
pub mod local;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// One fully rendered tool command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory, exclusive to this invocation while it runs
    pub cwd: PathBuf,
    /// Variables set explicitly on the child (profile token)
    pub env: Vec<(String, String)>,
    /// Capture without echoing
    pub quiet: bool,
}

impl Invocation {
    /// Shell-like rendering for display and digests. Not meant to be re-parsed.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.env.len() + self.args.len() + 1);
        for (k, v) in &self.env {
            parts.push(format!("{}={}", k, v));
        }
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured output from a finished invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// `None` when the child was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// The run was cancelled while the child was running
    pub interrupted: bool,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.interrupted
    }
}

/// Failure to run an invocation at all (as opposed to a non-zero exit).
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program} in {}: {source}", cwd.display())]
    Spawn {
        program: String,
        cwd: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Shared cancellation signal. The first `cancel` asks the running child to
/// finish; a second one forces it down.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicUsize>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }

    /// Cancelled more than once: stop waiting for a graceful exit.
    pub fn is_forced(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 1
    }
}

/// Runs one invocation to completion (or cancellation).
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation, cancel: &CancelFlag) -> Result<ExecOutput, ExecError>;
}
