//! `nip-harness` command-line entry point.
//!
//! Exit codes: 0 all selected experiments passed, 1 at least one failed,
//! 2 configuration or usage error.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nip_harness::config::HarnessConfig;
use nip_harness::experiment::ExperimentTable;
use nip_harness::report::summarize;
use nip_harness::runner::ExperimentRunner;

const EXIT_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let config = HarnessConfig::parse();
    init_logging(config.log_level());

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILED),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Returns whether every selected experiment passed.
fn run(config: &HarnessConfig) -> Result<bool> {
    let table = ExperimentTable::load(&config.table)
        .with_context(|| format!("loading experiment table {}", config.table.display()))?;

    if config.list {
        for definition in table.iter() {
            println!("{}\n    {}", definition.name(), definition.command());
        }
        return Ok(true);
    }

    let ctx = config.run_context().context("building run context")?;
    let options = config.runner_options().context("reading runner options")?;
    let names: Vec<String> = if config.experiments.is_empty() {
        table.names().map(String::from).collect()
    } else {
        config.experiments.clone()
    };
    let runner = ExperimentRunner::new(table, options);

    if config.dry_run {
        let mut ok = true;
        for planned in runner.plan(&names, &ctx)? {
            match planned.invocation {
                Ok(inv) => {
                    println!("{}", inv.experiment);
                    println!("    command: {}", inv.command);
                    println!("    log:     {}", inv.log.display());
                    for file in &inv.files {
                        println!("    file:    {}", file.display());
                    }
                    if let Some(results) = &inv.results {
                        println!("    results: {}", results.display());
                    }
                }
                Err(e) => {
                    ok = false;
                    println!("{}\n    {e}", planned.experiment);
                }
            }
        }
        return Ok(ok);
    }

    let results = runner.run_selected(&names, &ctx, config.mode(), config.jobs.max(1))?;
    let report = summarize(&results);
    if config.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{report}");
    }
    Ok(report.all_passed())
}
