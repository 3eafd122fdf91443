//! Batch summary: per-experiment verdicts and the checks that failed.
//!
//! An experiment passes only if its command exited with code zero, every
//! declared file exists and every declared threshold is met. Failures are
//! enumerated with the process check first, so a non-zero exit is always the
//! leading reason even when all outputs look fine.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::experiment::{ExecutionResult, MetricStatus, PerformanceOutcome, ProcessOutcome};
use crate::Result;

/// Overall outcome of one experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Every check passed.
    Pass,
    /// At least one check failed.
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        })
    }
}

/// One failed sub-check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum FailureReason {
    /// A template could not be rendered; nothing was executed.
    Template {
        /// Rendering error.
        reason: String,
    },
    /// The run record could not complete its lifecycle.
    Interrupted {
        /// Lifecycle error.
        reason: String,
    },
    /// Process exit code was not zero.
    ProcessExitCode {
        /// Exit code.
        code: i32,
    },
    /// Process was terminated by a signal.
    ProcessSignalled,
    /// Process could not be started.
    SpawnFailed {
        /// OS error text.
        reason: String,
    },
    /// Process exceeded the timeout.
    Timeout {
        /// Configured limit in seconds.
        after_secs: f64,
    },
    /// A declared output file does not exist.
    MissingFile {
        /// Resolved path.
        path: PathBuf,
    },
    /// The results file is absent or unparseable.
    MissingResults {
        /// Resolved path.
        path: PathBuf,
        /// Why it could not be used.
        reason: String,
    },
    /// A metric path could not be resolved.
    MissingMetric {
        /// Declared metric key.
        key: String,
        /// First absent segment.
        segment: String,
    },
    /// A metric leaf is not a number.
    NonNumericMetric {
        /// Declared metric key.
        key: String,
    },
    /// A metric is below its threshold.
    BelowThreshold {
        /// Declared metric key.
        key: String,
        /// Value found.
        actual: f64,
        /// Declared minimum.
        expected: f64,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template { reason } => write!(f, "template: {reason}"),
            Self::Interrupted { reason } => write!(f, "run interrupted: {reason}"),
            Self::ProcessExitCode { code } => write!(f, "process exit code: {code}"),
            Self::ProcessSignalled => f.write_str("process exit code: terminated by signal"),
            Self::SpawnFailed { reason } => write!(f, "process spawn failed: {reason}"),
            Self::Timeout { after_secs } => write!(f, "timeout: killed after {after_secs:.1}s"),
            Self::MissingFile { path } => write!(f, "missing file: {}", path.display()),
            Self::MissingResults { path, reason } => {
                write!(f, "missing results: {} ({reason})", path.display())
            }
            Self::MissingMetric { key, segment } => {
                write!(f, "missing metric: {key} (no '{segment}')")
            }
            Self::NonNumericMetric { key } => write!(f, "non-numeric metric: {key}"),
            Self::BelowThreshold {
                key,
                actual,
                expected,
            } => write!(f, "metric below threshold: {key} actual {actual} < expected {expected}"),
        }
    }
}

/// Summary of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentSummary {
    /// Experiment name.
    pub experiment: String,
    /// Overall verdict.
    pub verdict: Verdict,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Captured log.
    pub log: Option<PathBuf>,
    /// Number of file checks evaluated.
    pub files_checked: usize,
    /// Number of metric checks evaluated.
    pub metrics_checked: usize,
    /// Wall-clock duration.
    pub duration_secs: Option<f64>,
    /// Failed sub-checks, process first.
    pub failures: Vec<FailureReason>,
}

impl ExperimentSummary {
    /// Summarize one execution result.
    #[must_use]
    pub fn from_result(result: &ExecutionResult) -> Self {
        let failures = failures_of(result);
        let verdict = if failures.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        let metrics_checked = match result.performance() {
            PerformanceOutcome::Checked { metrics } => metrics.len(),
            _ => 0,
        };
        Self {
            experiment: result.experiment().to_string(),
            verdict,
            exit_code: result.exit_code(),
            log: result.log_path().map(PathBuf::from),
            files_checked: result.files().len(),
            metrics_checked,
            duration_secs: result.duration_secs(),
            failures,
        }
    }
}

fn failures_of(result: &ExecutionResult) -> Vec<FailureReason> {
    let mut failures = Vec::new();

    if let Some(reason) = result.template_error() {
        failures.push(FailureReason::Template {
            reason: reason.to_string(),
        });
    }

    if let Some(reason) = result.interrupted() {
        failures.push(FailureReason::Interrupted {
            reason: reason.to_string(),
        });
    }

    match result.process() {
        ProcessOutcome::Exited { code } if *code != 0 => {
            failures.push(FailureReason::ProcessExitCode { code: *code });
        }
        ProcessOutcome::Signalled => failures.push(FailureReason::ProcessSignalled),
        ProcessOutcome::SpawnFailed { reason } => failures.push(FailureReason::SpawnFailed {
            reason: reason.clone(),
        }),
        ProcessOutcome::TimedOut { after_secs } => failures.push(FailureReason::Timeout {
            after_secs: *after_secs,
        }),
        _ => {}
    }

    failures.extend(
        result
            .files()
            .iter()
            .filter(|check| !check.exists)
            .map(|check| FailureReason::MissingFile {
                path: check.path.clone(),
            }),
    );

    match result.performance() {
        PerformanceOutcome::NotDeclared => {}
        PerformanceOutcome::ResultsMissing { path, reason } => {
            failures.push(FailureReason::MissingResults {
                path: path.clone(),
                reason: reason.clone(),
            });
        }
        PerformanceOutcome::Checked { metrics } => {
            for check in metrics {
                let failure = match &check.status {
                    MetricStatus::Met => continue,
                    MetricStatus::Missing { segment } => FailureReason::MissingMetric {
                        key: check.key.clone(),
                        segment: segment.clone(),
                    },
                    MetricStatus::NotNumeric => FailureReason::NonNumericMetric {
                        key: check.key.clone(),
                    },
                    MetricStatus::BelowThreshold => FailureReason::BelowThreshold {
                        key: check.key.clone(),
                        actual: check.actual.unwrap_or(f64::NAN),
                        expected: check.expected,
                    },
                };
                failures.push(failure);
            }
        }
    }

    failures
}

/// Aggregate per-experiment outcomes of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    generated_at: DateTime<Utc>,
    experiments: Vec<ExperimentSummary>,
}

/// Summarize a batch of execution results, in the given order.
#[must_use]
pub fn summarize(results: &[ExecutionResult]) -> Report {
    Report {
        generated_at: Utc::now(),
        experiments: results.iter().map(ExperimentSummary::from_result).collect(),
    }
}

impl Report {
    /// Per-experiment summaries.
    #[must_use]
    pub fn experiments(&self) -> &[ExperimentSummary] {
        &self.experiments
    }

    /// Summary for one experiment.
    #[must_use]
    pub fn get(&self, experiment: &str) -> Option<&ExperimentSummary> {
        self.experiments.iter().find(|s| s.experiment == experiment)
    }

    /// Number of passing experiments.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.experiments
            .iter()
            .filter(|s| s.verdict == Verdict::Pass)
            .count()
    }

    /// Number of failing experiments.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.experiments.len() - self.passed()
    }

    /// Whether every experiment passed. An empty report passes.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// Render as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .experiments
            .iter()
            .map(|s| s.experiment.len())
            .max()
            .unwrap_or(0);

        for summary in &self.experiments {
            write!(f, "{}  {:<width$}", summary.verdict, summary.experiment)?;
            if let Some(secs) = summary.duration_secs {
                write!(f, "  {secs:>8.1}s")?;
            }
            writeln!(f)?;
            for failure in &summary.failures {
                writeln!(f, "      - {failure}")?;
            }
        }
        write!(
            f,
            "{} experiment(s): {} passed, {} failed",
            self.experiments.len(),
            self.passed(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{FileCheck, MetricCheck};
    use serde_json::json;

    fn verified(process: ProcessOutcome, files: Vec<FileCheck>, perf: PerformanceOutcome) -> ExecutionResult {
        let mut result = ExecutionResult::new("exp");
        result.start("cmd".into(), PathBuf::from("exp.log")).unwrap();
        result.exit(process).unwrap();
        result.verify(files, perf).unwrap();
        result.finish().unwrap();
        result
    }

    #[test]
    fn test_exit_code_leads_failures() {
        let result = verified(
            ProcessOutcome::Exited { code: 2 },
            vec![FileCheck {
                path: PathBuf::from("a"),
                exists: false,
            }],
            PerformanceOutcome::NotDeclared,
        );
        let summary = ExperimentSummary::from_result(&result);
        assert_eq!(summary.verdict, Verdict::Fail);
        assert_eq!(summary.failures[0], FailureReason::ProcessExitCode { code: 2 });
        assert!(matches!(summary.failures[1], FailureReason::MissingFile { .. }));
    }

    #[test]
    fn test_below_threshold_side_by_side() {
        let doc = json!({"psnr": 39.5});
        let result = verified(
            ProcessOutcome::Exited { code: 0 },
            vec![],
            PerformanceOutcome::Checked {
                metrics: vec![MetricCheck::evaluate(&doc, "psnr", 40.0)],
            },
        );
        let report = summarize(&[result]);
        let text = report.to_string();
        assert!(text.contains("FAIL"));
        assert!(text.contains("actual 39.5 < expected 40"));
        assert!(!report.all_passed());
    }

    #[test]
    fn test_interrupted_run_fails() {
        let mut result = ExecutionResult::new("exp");
        result.start("cmd".into(), PathBuf::from("exp.log")).unwrap();
        let err = result.finish().unwrap_err();
        result.interrupt(&err);
        let summary = ExperimentSummary::from_result(&result);
        assert_eq!(summary.verdict, Verdict::Fail);
        assert!(matches!(summary.failures[0], FailureReason::Interrupted { .. }));
    }

    #[test]
    fn test_empty_report_passes() {
        let report = summarize(&[]);
        assert!(report.all_passed());
        assert!(report.to_string().contains("0 experiment(s)"));
    }

    #[test]
    fn test_json_rendering() {
        let result = verified(
            ProcessOutcome::Exited { code: 0 },
            vec![],
            PerformanceOutcome::NotDeclared,
        );
        let json = summarize(&[result]).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["experiments"][0]["verdict"], "PASS");
    }
}
