//! # nip-harness: Experiment Verification for Joint NIP/FAN Training
//!
//! Drives the training experiments of a neural imaging pipeline (NIP) and a
//! forensic analysis network (FAN) from a declarative experiment table, then
//! checks that each run produced its declared outputs and reached its
//! performance bar.
//!
//! The training itself is opaque: the harness only renders a command, runs
//! it with output captured to a log, checks that files exist, and compares
//! metrics read from a JSON results document against thresholds.
//!
//! ## Pipeline
//!
//! ```text
//! framework.json ──> ExperimentTable ──> ExperimentRunner ──> ExecutionResult ──> Report
//!                                            │  render {cam} {root}
//!                                            │  sh -c <command> > log 2>&1
//!                                            │  files exist?  metrics >= thresholds?
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use nip_harness::experiment::{ExperimentTable, RunContext};
//! use nip_harness::report::summarize;
//! use nip_harness::runner::{ExperimentRunner, RunnerOptions};
//!
//! let table = ExperimentTable::load("framework.json")?;
//! let names: Vec<String> = table.names().map(String::from).collect();
//! let runner = ExperimentRunner::new(table, RunnerOptions::default());
//!
//! let ctx = RunContext::new("Nikon D90", "/tmp/exp1")?;
//! let report = summarize(&runner.run_batch(&names, &ctx)?);
//! println!("{report}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod experiment;
pub mod report;
pub mod runner;
pub mod template;

pub use error::{Error, Result};
