//! Harness configuration: command-line flags with environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::experiment::RunContext;
use crate::runner::{RunMode, RunnerOptions};
use crate::{Error, Result};

/// Camera used when none is given.
pub const DEFAULT_CAM: &str = "Nikon D90";

/// Runtime configuration of one harness invocation.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "nip-harness",
    version,
    about = "Run NIP/FAN training experiments and verify their outputs and performance"
)]
pub struct HarnessConfig {
    /// Experiments to run (default: every experiment, in table order)
    #[arg(value_name = "EXPERIMENT")]
    pub experiments: Vec<String>,

    /// Experiment table
    #[arg(short, long, env = "NIP_HARNESS_TABLE", default_value = "framework.json")]
    pub table: PathBuf,

    /// Camera name substituted for {cam} and {}
    #[arg(short, long, env = "NIP_HARNESS_CAM", default_value = DEFAULT_CAM)]
    pub cam: String,

    /// Output root substituted for {root}; relative outputs resolve against it
    #[arg(short, long, env = "NIP_HARNESS_ROOT", default_value = "./data/harness")]
    pub root: PathBuf,

    /// Kill an experiment's command after this many seconds
    #[arg(long, env = "NIP_HARNESS_TIMEOUT", value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Number of experiments to run concurrently
    #[arg(short, long, env = "NIP_HARNESS_JOBS", default_value_t = 1)]
    pub jobs: usize,

    /// Working directory for experiment commands
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Extra placeholder binding, usable as {KEY} in commands
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// List experiments in the table and exit
    #[arg(long)]
    pub list: bool,

    /// Print rendered commands and paths without executing anything
    #[arg(long, conflicts_with = "verify_only")]
    pub dry_run: bool,

    /// Verify outputs of an earlier run without executing commands
    #[arg(long)]
    pub verify_only: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_var(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

impl HarnessConfig {
    /// Substitution context for this invocation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unsafe camera name or a bad
    /// variable key.
    pub fn run_context(&self) -> Result<RunContext> {
        RunContext::builder(self.cam.clone(), self.root.clone())
            .vars(self.vars.iter().cloned())
            .build()
    }

    /// Library-side execution options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a non-positive or non-finite
    /// timeout.
    pub fn runner_options(&self) -> Result<RunnerOptions> {
        let timeout = match self.timeout {
            None => None,
            Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => {
                return Err(Error::InvalidInput(format!(
                    "timeout must be a positive number of seconds, got {secs}"
                )))
            }
        };
        Ok(RunnerOptions {
            timeout,
            workdir: self.workdir.clone(),
        })
    }

    /// Run or verify-only.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        if self.verify_only {
            RunMode::VerifyOnly
        } else {
            RunMode::Execute
        }
    }

    /// Default `RUST_LOG` directive for the chosen verbosity.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
