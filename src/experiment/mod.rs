//! Experiment model: table, definitions, run context and run records
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentTable (1) ──< ExperimentDefinition (N)
//!                                 │ run with RunContext
//!                                 ▼
//!                          ExecutionResult
//!                                 ├──< FileCheck (N)
//!                                 └── PerformanceOutcome ──< MetricCheck (N)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use nip_harness::experiment::{load_definitions, RunContext};
//!
//! let table = load_definitions(r#"{
//!     "train-nip": {
//!         "log": "train-nip.log",
//!         "command": "python3 train_nip.py --cam \"{cam}\" --out {root}/nip_snapshots",
//!         "files": ["nip_snapshots/{}/inet/progress.json"]
//!     }
//! }"#)?;
//! let ctx = RunContext::new("Nikon D90", "/tmp/exp1")?;
//!
//! assert_eq!(table.resolve("train-nip")?.files().len(), 1);
//! assert_eq!(ctx.cam(), "Nikon D90");
//! # Ok::<(), nip_harness::Error>(())
//! ```

mod checks;
mod context;
mod definition;
mod run_record;
mod table;

pub use checks::{lookup_metric, metric_path, FileCheck, MetricCheck, MetricStatus, PerformanceOutcome};
pub use context::{RunContext, RunContextBuilder, CAM, ROOT};
pub use definition::{ExperimentDefinition, ExperimentDefinitionBuilder, PerformanceSpec};
pub use run_record::{ExecutionResult, ProcessOutcome, RunStatus};
pub use table::{load_definitions, ExperimentTable};
