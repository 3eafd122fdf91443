//! External command execution with combined output capture and timeout.
//!
//! The rendered command runs through the platform shell. stdout and stderr
//! share one log file, so the log interleaves them the way a terminal would.
//! On Unix the shell leads its own process group, so a timeout kills the
//! whole tree (compound commands, subshells, the training script itself)
//! and not just the shell. The child is then reaped; whatever the tree wrote
//! to the log until then stays on disk.

use std::fs::{self, File};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::experiment::ProcessOutcome;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Build the shell invocation for a rendered command line.
#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

/// Build the shell invocation for a rendered command line.
///
/// The shell is placed in a new process group whose id equals its pid.
#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    use std::os::unix::process::CommandExt;

    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]).process_group(0);
    cmd
}

/// Build the shell invocation for a rendered command line.
#[cfg(not(any(unix, windows)))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

/// Run `command` to completion, capturing its output into `log_path`.
///
/// Never fails: spawn and wait problems are folded into the returned
/// [`ProcessOutcome`] so the caller can still verify partial output.
pub(crate) fn execute(
    command: &str,
    log_path: &Path,
    workdir: Option<&Path>,
    timeout: Option<Duration>,
) -> ProcessOutcome {
    let log = match open_log(log_path) {
        Ok(log) => log,
        Err(e) => {
            return ProcessOutcome::SpawnFailed {
                reason: format!("cannot open log {}: {e}", log_path.display()),
            }
        }
    };
    let stderr = match log.try_clone() {
        Ok(stderr) => stderr,
        Err(e) => {
            return ProcessOutcome::SpawnFailed {
                reason: format!("cannot share log handle: {e}"),
            }
        }
    };

    let mut cmd = shell_command(command);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr));
    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ProcessOutcome::SpawnFailed {
                reason: e.to_string(),
            }
        }
    };
    tracing::debug!(pid = child.id(), "process spawned");

    let waited = match timeout {
        Some(limit) => child.wait_timeout(limit),
        None => child.wait().map(Some),
    };

    match waited {
        Ok(Some(status)) => outcome_of(status),
        Ok(None) => {
            terminate(&mut child);
            ProcessOutcome::TimedOut {
                after_secs: timeout.map_or(0.0, |t| t.as_secs_f64()),
            }
        }
        Err(e) => {
            terminate(&mut child);
            ProcessOutcome::SpawnFailed {
                reason: format!("waiting for process: {e}"),
            }
        }
    }
}

/// Kill the child's whole process group, then reap the child.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match i32::try_from(child.id()) {
        Ok(pid) => {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                tracing::warn!(pid, error = %e, "killpg failed; killing shell only");
                let _ = child.kill();
            }
        }
        Err(_) => {
            let _ = child.kill();
        }
    }
    let _ = child.wait();
}

/// Kill the child, then reap it.
#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    File::create(path)
}

fn outcome_of(status: ExitStatus) -> ProcessOutcome {
    status
        .code()
        .map_or(ProcessOutcome::Signalled, |code| ProcessOutcome::Exited { code })
}

/// Extension trait to add `wait_timeout` to `Child`.
trait ChildExt {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>>;
}

impl ChildExt for Child {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
        let start = Instant::now();
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status));
            }
            if start.elapsed() >= timeout {
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL.min(timeout.saturating_sub(start.elapsed())));
        }
    }
}
