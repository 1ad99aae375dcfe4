//! TR-011: Local process transport.
//!
//! Spawns the tool in the environment directory with stdin inherited (so an
//! interactive `apply` can prompt). Stdout and stderr are captured by reader
//! threads and echoed live unless the invocation is quiet.
//!
//! On interrupt the child already has the terminal's SIGINT, so it is given
//! a grace period to release locks and persist state. It is killed only when
//! that runs out or the interrupt is repeated.

use super::{CancelFlag, CommandRunner, ExecError, ExecOutput, Invocation};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const READ_BUF_SIZE: usize = 8192;

/// How long an interrupted child may take to shut down before it is killed.
pub const DEFAULT_INTERRUPT_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Echo {
    Stdout,
    Stderr,
}

/// Production runner backed by `std::process`.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    grace: Duration,
    echo_to_stderr: bool,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            grace: DEFAULT_INTERRUPT_GRACE,
            echo_to_stderr: false,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Mirror child stdout to our stderr, keeping our stdout for a
    /// machine-readable report.
    pub fn with_echo_to_stderr(mut self, echo_to_stderr: bool) -> Self {
        self.echo_to_stderr = echo_to_stderr;
        self
    }

    fn echo_target(&self, stream: Echo, quiet: bool) -> Option<Echo> {
        match (quiet, self.echo_to_stderr) {
            (true, _) => None,
            (false, true) => Some(Echo::Stderr),
            (false, false) => Some(stream),
        }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, inv: &Invocation, cancel: &CancelFlag) -> Result<ExecOutput, ExecError> {
        tracing::info!(cwd = %inv.cwd.display(), "running {}", inv.command_line());

        let mut child = Command::new(&inv.program)
            .args(&inv.args)
            .current_dir(&inv.cwd)
            .envs(inv.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: inv.program.clone(),
                cwd: inv.cwd.clone(),
                source,
            })?;

        let out_reader = child
            .stdout
            .take()
            .map(|s| spawn_reader(s, self.echo_target(Echo::Stdout, inv.quiet)));
        let err_reader = child
            .stderr
            .take()
            .map(|s| spawn_reader(s, self.echo_target(Echo::Stderr, inv.quiet)));

        let wait_err = |source| ExecError::Wait {
            program: inv.program.clone(),
            source,
        };

        let mut deadline: Option<Instant> = None;
        let (status, interrupted) = loop {
            if let Some(status) = child.try_wait().map_err(wait_err)? {
                break (status, cancel.is_cancelled());
            }
            match deadline {
                None if cancel.is_cancelled() => {
                    tracing::warn!(
                        program = %inv.program,
                        grace_secs = self.grace.as_secs_f64(),
                        "interrupted; waiting for child to exit"
                    );
                    deadline = Some(Instant::now() + self.grace);
                }
                Some(at) if cancel.is_forced() || Instant::now() >= at => {
                    tracing::warn!(program = %inv.program, "child still running; killing");
                    // It may exit on its own between the poll and the kill.
                    let _ = child.kill();
                    let status = child.wait().map_err(wait_err)?;
                    break (status, true);
                }
                _ => {}
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(ExecOutput {
            exit_code: status.code(),
            stdout: join_reader(out_reader),
            stderr: join_reader(err_reader),
            interrupted,
        })
    }
}

/// Drain a pipe to completion, optionally mirroring each chunk to our own
/// stdout/stderr. Raw chunks (not lines) so prompts without a newline show.
fn spawn_reader<R: Read + Send + 'static>(mut src: R, echo: Option<Echo>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut captured = Vec::new();
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            let n = match src.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            captured.extend_from_slice(&buf[..n]);
            match echo {
                Some(Echo::Stdout) => {
                    let mut out = std::io::stdout().lock();
                    let _ = out.write_all(&buf[..n]);
                    let _ = out.flush();
                }
                Some(Echo::Stderr) => {
                    let mut err = std::io::stderr().lock();
                    let _ = err.write_all(&buf[..n]);
                    let _ = err.flush();
                }
                None => {}
            }
        }
        captured
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn sh(script: &str, cwd: &Path) -> Invocation {
        Invocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            cwd: cwd.to_path_buf(),
            env: vec![],
            quiet: true,
        }
    }

    #[test]
    fn test_tr011_local_echo() {
        let dir = tempfile::tempdir().unwrap();
        let out = ProcessRunner::new()
            .run(&sh("echo hello", dir.path()), &CancelFlag::new())
            .unwrap();
        assert!(out.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
    }

    #[test]
    fn test_tr011_local_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = ProcessRunner::new()
            .run(&sh("echo boom >&2; exit 42", dir.path()), &CancelFlag::new())
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(42));
        assert!(String::from_utf8_lossy(&out.stderr).contains("boom"));
        assert!(!out.interrupted);
    }

    #[test]
    fn test_tr011_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "").unwrap();
        let out = ProcessRunner::new()
            .run(&sh("ls", dir.path()), &CancelFlag::new())
            .unwrap();
        assert!(String::from_utf8_lossy(&out.stdout).contains("main.tf"));
    }

    #[test]
    fn test_tr011_explicit_env() {
        let dir = tempfile::tempdir().unwrap();
        let mut inv = sh("printf %s \"$TERRACE_PROFILE\"", dir.path());
        inv.env = vec![("TERRACE_PROFILE".to_string(), "stage".to_string())];
        let out = ProcessRunner::new().run(&inv, &CancelFlag::new()).unwrap();
        assert_eq!(out.stdout, b"stage");
    }

    #[test]
    fn test_tr011_spawn_error_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation {
            program: "terrace-no-such-binary".to_string(),
            args: vec![],
            cwd: dir.path().to_path_buf(),
            env: vec![],
            quiet: true,
        };
        let err = ProcessRunner::new().run(&inv, &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
        assert!(err.to_string().contains("terrace-no-such-binary"));
    }

    #[test]
    fn test_tr011_spawn_error_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let inv = sh("true", &dir.path().join("absent"));
        assert!(ProcessRunner::new().run(&inv, &CancelFlag::new()).is_err());
    }

    /// Waits for `pid_file`, then delivers SIGINT to that pid and cancels,
    /// as a terminal Ctrl-C does.
    fn interrupt_when_ready(pid_file: PathBuf, flag: CancelFlag) -> JoinHandle<()> {
        thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(10);
            let pid = loop {
                let parsed = std::fs::read_to_string(&pid_file)
                    .ok()
                    .and_then(|s| s.trim().parse::<u32>().ok());
                if let Some(pid) = parsed {
                    break pid;
                }
                assert!(Instant::now() < deadline, "child never wrote its pid");
                thread::sleep(Duration::from_millis(20));
            };
            let status = Command::new("kill")
                .args(["-INT", &pid.to_string()])
                .status()
                .unwrap();
            assert!(status.success());
            flag.cancel();
        })
    }

    #[test]
    fn test_tr011_interrupted_child_finishes_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let flag = CancelFlag::new();
        let signaller = interrupt_when_ready(dir.path().join("pid"), flag.clone());

        let script = "trap 'sleep 0.5; echo saved > state_saved; exit 130' INT; \
                      echo $$ > pid; while :; do sleep 0.1; done";
        let out = ProcessRunner::new()
            .with_grace(Duration::from_secs(20))
            .run(&sh(script, dir.path()), &flag)
            .unwrap();
        signaller.join().unwrap();

        assert!(out.interrupted);
        assert_eq!(out.exit_code, Some(130));
        assert!(dir.path().join("state_saved").exists());
    }

    #[test]
    fn test_tr011_cancel_kills_child_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let flag = CancelFlag::new();
        let trigger = flag.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });

        let start = Instant::now();
        let out = ProcessRunner::new()
            .with_grace(Duration::from_millis(300))
            .run(&sh("exec sleep 30", dir.path()), &flag)
            .unwrap();
        canceller.join().unwrap();

        assert!(out.interrupted);
        assert!(!out.success());
        assert!(start.elapsed() >= Duration::from_millis(450));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_tr011_second_cancel_skips_grace() {
        let dir = tempfile::tempdir().unwrap();
        let flag = CancelFlag::new();
        let trigger = flag.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });

        let start = Instant::now();
        let out = ProcessRunner::new()
            .with_grace(Duration::from_secs(60))
            .run(&sh("exec sleep 30", dir.path()), &flag)
            .unwrap();
        canceller.join().unwrap();

        assert!(out.interrupted);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_tr011_echo_target() {
        let plain = ProcessRunner::new();
        assert_eq!(plain.echo_target(Echo::Stdout, false), Some(Echo::Stdout));
        assert_eq!(plain.echo_target(Echo::Stderr, false), Some(Echo::Stderr));
        assert_eq!(plain.echo_target(Echo::Stdout, true), None);

        let redirected = ProcessRunner::new().with_echo_to_stderr(true);
        assert_eq!(redirected.echo_target(Echo::Stdout, false), Some(Echo::Stderr));
        assert_eq!(redirected.echo_target(Echo::Stdout, true), None);
    }

    #[test]
    fn test_tr011_echo_to_stderr_still_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let mut inv = sh("echo captured", dir.path());
        inv.quiet = false;
        let out = ProcessRunner::new()
            .with_echo_to_stderr(true)
            .run(&inv, &CancelFlag::new())
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "captured");
    }
}
