//! Run Record - execution result of one experiment run

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FileCheck, PerformanceOutcome};
use crate::{Error, Result};

/// Lifecycle of a run.
///
/// `Pending -> Running -> Exited -> Verified -> {Pass, Fail}`. There is no
/// transition back; a template failure goes straight from `Pending` to
/// `Fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created but not yet started.
    Pending,
    /// External command is executing.
    Running,
    /// External command finished (or was skipped/killed).
    Exited,
    /// File and performance checks have been evaluated.
    Verified,
    /// Every check passed.
    Pass,
    /// At least one check failed.
    Fail,
}

impl RunStatus {
    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Exited | Self::Fail)
                | (Self::Running, Self::Exited)
                | (Self::Exited, Self::Verified)
                | (Self::Verified, Self::Pass | Self::Fail)
        )
    }

    /// Whether the run has reached `Pass` or `Fail`.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Pass | Self::Fail)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Exited => "EXITED",
            Self::Verified => "VERIFIED",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        };
        f.write_str(label)
    }
}

/// How the external command ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Command was never started (template failure).
    NotRun,
    /// Command execution was deliberately skipped (verify-only mode).
    Skipped,
    /// Process exited with a code.
    Exited {
        /// Exit code.
        code: i32,
    },
    /// Process was terminated by a signal.
    Signalled,
    /// Process could not be spawned.
    SpawnFailed {
        /// OS error text.
        reason: String,
    },
    /// Process exceeded the timeout and was killed.
    TimedOut {
        /// Configured limit in seconds.
        after_secs: f64,
    },
}

impl ProcessOutcome {
    /// Whether this outcome satisfies the exit-code check.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Exited { code: 0 } | Self::Skipped)
    }

    /// Exit code, if the process exited normally.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited { code } => Some(*code),
            _ => None,
        }
    }

    /// The error this outcome stands for, if it is a failure.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        match self {
            Self::Exited { code: 0 } | Self::Skipped | Self::NotRun => None,
            Self::Exited { code } => Some(Error::Process(format!("exited with code {code}"))),
            Self::Signalled => Some(Error::Process("terminated by signal".into())),
            Self::SpawnFailed { reason } => Some(Error::Process(format!("spawn failed: {reason}"))),
            Self::TimedOut { after_secs } => Some(Error::Timeout(*after_secs)),
        }
    }
}

/// Result of one experiment run.
///
/// Produced fresh per run; never merged with earlier results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    experiment: String,
    status: RunStatus,
    command: Option<String>,
    log_path: Option<PathBuf>,
    process: ProcessOutcome,
    template_error: Option<String>,
    interrupted: Option<String>,
    files: Vec<FileCheck>,
    performance: PerformanceOutcome,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl ExecutionResult {
    /// Create a pending result for `experiment`.
    #[must_use]
    pub fn new(experiment: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
            status: RunStatus::Pending,
            command: None,
            log_path: None,
            process: ProcessOutcome::NotRun,
            template_error: None,
            interrupted: None,
            files: Vec::new(),
            performance: PerformanceOutcome::NotDeclared,
            started_at: None,
            ended_at: None,
        }
    }

    /// Experiment name.
    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Rendered command, if rendering succeeded.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Path the combined output was captured to.
    #[must_use]
    pub fn log_path(&self) -> Option<&std::path::Path> {
        self.log_path.as_deref()
    }

    /// How the external command ended.
    #[must_use]
    pub const fn process(&self) -> &ProcessOutcome {
        &self.process
    }

    /// Exit code, if the process exited normally.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.process.exit_code()
    }

    /// Template failure that prevented the run, if any.
    #[must_use]
    pub fn template_error(&self) -> Option<&str> {
        self.template_error.as_deref()
    }

    /// Why the lifecycle was cut short, if it was.
    #[must_use]
    pub fn interrupted(&self) -> Option<&str> {
        self.interrupted.as_deref()
    }

    /// File-existence checks, one per declared file.
    #[must_use]
    pub fn files(&self) -> &[FileCheck] {
        &self.files
    }

    /// Performance verification.
    #[must_use]
    pub const fn performance(&self) -> &PerformanceOutcome {
        &self.performance
    }

    /// Start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// End timestamp.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Wall-clock duration in seconds, once both timestamps are set.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> Option<f64> {
        let (start, end) = (self.started_at?, self.ended_at?);
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }

    /// Whether the process, file and performance checks all passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.template_error.is_none()
            && self.interrupted.is_none()
            && self.process.is_success()
            && self.files.iter().all(|f| f.exists)
            && self.performance.passed()
    }

    fn advance(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_advance_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// `Pending -> Running`: record the rendered command and log path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the run was already started.
    pub fn start(&mut self, command: String, log_path: PathBuf) -> Result<()> {
        self.advance(RunStatus::Running)?;
        self.command = Some(command);
        self.log_path = Some(log_path);
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Pending -> Exited` without running anything (verify-only).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the run was already started.
    pub fn skip(&mut self) -> Result<()> {
        self.advance(RunStatus::Exited)?;
        self.process = ProcessOutcome::Skipped;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Running -> Exited`: record how the process ended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the run is `Running`.
    pub fn exit(&mut self, process: ProcessOutcome) -> Result<()> {
        self.advance(RunStatus::Exited)?;
        self.process = process;
        Ok(())
    }

    /// `Exited -> Verified`: record the verification checks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the run is `Exited`.
    pub fn verify(&mut self, files: Vec<FileCheck>, performance: PerformanceOutcome) -> Result<()> {
        self.advance(RunStatus::Verified)?;
        self.files = files;
        self.performance = performance;
        Ok(())
    }

    /// `Verified -> Pass | Fail`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the run is `Verified`.
    pub fn finish(&mut self) -> Result<RunStatus> {
        let verdict = if self.passed() {
            RunStatus::Pass
        } else {
            RunStatus::Fail
        };
        self.advance(verdict)?;
        self.ended_at = Some(Utc::now());
        Ok(verdict)
    }

    /// `Pending -> Fail` because a template could not be rendered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the run is `Pending`.
    pub fn abort(&mut self, template_error: &Error) -> Result<()> {
        self.advance(RunStatus::Fail)?;
        self.template_error = Some(template_error.to_string());
        let now = Utc::now();
        self.started_at = Some(now);
        self.ended_at = Some(now);
        Ok(())
    }

    /// Force `Fail` from any non-final status after a lifecycle error.
    ///
    /// A final result is left as is.
    pub fn interrupt(&mut self, error: &Error) {
        if self.status.is_final() {
            return;
        }
        self.status = RunStatus::Fail;
        self.interrupted = Some(error.to_string());
        self.ended_at = Some(Utc::now());
    }
}
