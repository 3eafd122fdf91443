//! Experiment Runner - drives experiments end-to-end
//!
//! One run renders every template up front, executes the command with its
//! output captured to the log, then verifies files and performance even if
//! the command failed, so "did not run" and "ran but missed the target" can
//! be told apart.
//!
//! # Example
//!
//! ```rust,no_run
//! use nip_harness::experiment::{ExperimentTable, RunContext};
//! use nip_harness::runner::{ExperimentRunner, RunnerOptions};
//!
//! let table = ExperimentTable::load("framework.json")?;
//! let runner = ExperimentRunner::new(table, RunnerOptions::default());
//! let ctx = RunContext::new("Nikon D90", "/tmp/exp1")?;
//!
//! let results = runner.run_batch(&["train-nip"], &ctx)?;
//! assert_eq!(results.len(), 1);
//! # Ok::<(), nip_harness::Error>(())
//! ```

mod process;
mod verify;

pub use verify::{load_results, verify_files, verify_performance};

use std::path::PathBuf;
use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;

use crate::experiment::{
    ExecutionResult, ExperimentDefinition, ExperimentTable, ProcessOutcome, RunContext,
};
use crate::template::render;
use crate::{Error, Result};

/// Execution knobs independent of any single experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Wall-clock limit per external command.
    pub timeout: Option<Duration>,
    /// Working directory for external commands (defaults to the current one).
    pub workdir: Option<PathBuf>,
}

/// Whether the external command is executed or only its outputs verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Execute, then verify.
    #[default]
    Execute,
    /// Verify outputs of an earlier run without executing anything.
    VerifyOnly,
}

/// Every rendered template of one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Experiment name.
    pub experiment: String,
    /// Rendered command line.
    pub command: String,
    /// Resolved log path.
    pub log: PathBuf,
    /// Resolved required output files.
    pub files: Vec<PathBuf>,
    /// Resolved results file, if a performance block exists.
    pub results: Option<PathBuf>,
}

/// Render every template of `definition` for `ctx`.
///
/// # Errors
///
/// Returns [`Error::Template`] for the first template that cannot be rendered.
pub fn render_invocation(definition: &ExperimentDefinition, ctx: &RunContext) -> Result<Invocation> {
    Ok(Invocation {
        experiment: definition.name().to_string(),
        command: render(definition.command(), ctx)?,
        log: ctx.resolve(&render(definition.log(), ctx)?),
        files: verify::render_files(definition, ctx)?,
        results: verify::render_results_path(definition, ctx)?,
    })
}

/// A dry-run entry: the rendered invocation or why it could not be rendered.
#[derive(Debug)]
pub struct Planned {
    /// Experiment name.
    pub experiment: String,
    /// Rendered invocation.
    pub invocation: Result<Invocation>,
}

/// Runs experiments from a loaded table.
#[derive(Debug)]
pub struct ExperimentRunner {
    table: ExperimentTable,
    options: RunnerOptions,
}

impl ExperimentRunner {
    /// Create a runner over `table`.
    #[must_use]
    pub const fn new(table: ExperimentTable, options: RunnerOptions) -> Self {
        Self { table, options }
    }

    /// The experiment table.
    #[must_use]
    pub const fn table(&self) -> &ExperimentTable {
        &self.table
    }

    /// The execution options.
    #[must_use]
    pub const fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run one experiment: render, execute, verify, decide.
    ///
    /// Never fails as a whole; every problem is recorded in the result.
    #[must_use]
    pub fn run(&self, definition: &ExperimentDefinition, ctx: &RunContext) -> ExecutionResult {
        self.run_with_mode(definition, ctx, RunMode::Execute)
    }

    /// Verify outputs of an earlier run without executing the command.
    #[must_use]
    pub fn verify_only(&self, definition: &ExperimentDefinition, ctx: &RunContext) -> ExecutionResult {
        self.run_with_mode(definition, ctx, RunMode::VerifyOnly)
    }

    fn run_with_mode(
        &self,
        definition: &ExperimentDefinition,
        ctx: &RunContext,
        mode: RunMode,
    ) -> ExecutionResult {
        let span = tracing::info_span!("experiment", name = definition.name());
        let _guard = span.enter();

        let mut result = ExecutionResult::new(definition.name());
        if let Err(e) = self.drive(definition, ctx, mode, &mut result) {
            tracing::error!(error = %e, status = %result.status(), "run interrupted");
            result.interrupt(&e);
        }
        result
    }

    fn drive(
        &self,
        definition: &ExperimentDefinition,
        ctx: &RunContext,
        mode: RunMode,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        let invocation = match render_invocation(definition, ctx) {
            Ok(invocation) => invocation,
            Err(e) => {
                tracing::warn!(error = %e, "template rendering failed; experiment skipped");
                return result.abort(&e);
            }
        };

        match mode {
            RunMode::Execute => {
                tracing::info!(
                    command = %invocation.command,
                    log = %invocation.log.display(),
                    "running"
                );
                result.start(invocation.command.clone(), invocation.log.clone())?;
                let outcome = process::execute(
                    &invocation.command,
                    &invocation.log,
                    self.options.workdir.as_deref(),
                    self.options.timeout,
                );
                log_outcome(&outcome);
                result.exit(outcome)?;
            }
            RunMode::VerifyOnly => {
                tracing::info!("verifying existing outputs");
                result.skip()?;
            }
        }

        let files = verify::check_paths(invocation.files);
        let performance = verify::performance_outcome(definition, invocation.results.as_deref());
        result.verify(files, performance)?;

        let verdict = result.finish()?;
        tracing::info!(%verdict, duration_secs = ?result.duration_secs(), "finished");
        Ok(())
    }

    /// Run the named experiments one after another, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownExperiment`] before anything executes if any
    /// name is not in the table.
    pub fn run_batch<S: AsRef<str>>(&self, names: &[S], ctx: &RunContext) -> Result<Vec<ExecutionResult>> {
        self.run_selected(names, ctx, RunMode::Execute, 1)
    }

    /// Run the named experiments on a pool of `jobs` workers.
    ///
    /// Results are returned in the requested order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownExperiment`] before anything executes, or
    /// [`Error::InvalidInput`] if the worker pool cannot be built.
    pub fn run_batch_parallel<S: AsRef<str>>(
        &self,
        names: &[S],
        ctx: &RunContext,
        jobs: usize,
    ) -> Result<Vec<ExecutionResult>> {
        self.run_selected(names, ctx, RunMode::Execute, jobs)
    }

    /// Run or verify the named experiments with up to `jobs` in flight.
    ///
    /// # Errors
    ///
    /// See [`ExperimentRunner::run_batch_parallel`].
    pub fn run_selected<S: AsRef<str>>(
        &self,
        names: &[S],
        ctx: &RunContext,
        mode: RunMode,
        jobs: usize,
    ) -> Result<Vec<ExecutionResult>> {
        let definitions = self.table.resolve_all(names)?;
        tracing::info!(experiments = definitions.len(), jobs, ?mode, "starting batch");

        if jobs <= 1 || definitions.len() <= 1 {
            return Ok(definitions
                .into_iter()
                .map(|def| self.run_with_mode(def, ctx, mode))
                .collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| Error::InvalidInput(format!("cannot build worker pool: {e}")))?;
        Ok(pool.install(|| {
            definitions
                .par_iter()
                .map(|def| self.run_with_mode(def, ctx, mode))
                .collect()
        }))
    }

    /// Render every named experiment without executing anything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownExperiment`] if any name is not in the table.
    pub fn plan<S: AsRef<str>>(&self, names: &[S], ctx: &RunContext) -> Result<Vec<Planned>> {
        Ok(self
            .table
            .resolve_all(names)?
            .into_iter()
            .map(|def| Planned {
                experiment: def.name().to_string(),
                invocation: render_invocation(def, ctx),
            })
            .collect())
    }
}

fn log_outcome(outcome: &ProcessOutcome) {
    match outcome {
        ProcessOutcome::Exited { code: 0 } => tracing::info!(exit_code = 0, "process exited"),
        ProcessOutcome::Exited { code } => {
            tracing::warn!(exit_code = code, "process failed; verifying partial output");
        }
        ProcessOutcome::TimedOut { after_secs } => {
            tracing::warn!(after_secs, "process timed out and was killed");
        }
        ProcessOutcome::SpawnFailed { reason } => {
            tracing::error!(%reason, "process could not be started");
        }
        ProcessOutcome::Signalled => tracing::warn!("process terminated by signal"),
        ProcessOutcome::NotRun | ProcessOutcome::Skipped => {}
    }
}
