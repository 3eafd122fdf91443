//! Verification records - file-existence and performance-threshold checks

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Existence check of one declared output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCheck {
    /// Rendered path, joined with the output root.
    pub path: PathBuf,
    /// Whether the path existed at verification time.
    pub exists: bool,
}

/// Outcome of one metric threshold check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricStatus {
    /// `actual >= expected`.
    Met,
    /// Present but `actual < expected`.
    BelowThreshold,
    /// A path segment was absent from the results document.
    Missing {
        /// First absent segment.
        segment: String,
    },
    /// The leaf value is not a number.
    NotNumeric,
}

/// Threshold check of one declared metric.
///
/// Metrics are "higher is better": a present value passes iff it is greater
/// than or equal to the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCheck {
    /// Declared metric path, e.g. `Performance/psnr`.
    pub key: String,
    /// Value found in the results document.
    pub actual: Option<f64>,
    /// Declared minimum.
    pub expected: f64,
    /// Check outcome.
    #[serde(flatten)]
    pub status: MetricStatus,
}

impl MetricCheck {
    /// Evaluate `key >= expected` against a parsed results document.
    #[must_use]
    pub fn evaluate(document: &Value, key: &str, expected: f64) -> Self {
        let (actual, status) = match lookup_metric(document, key) {
            Err(Error::MissingMetric { segment, .. }) => (None, MetricStatus::Missing { segment }),
            Err(_) => (None, MetricStatus::NotNumeric),
            Ok(leaf) => match as_number(leaf) {
                Some(actual) if actual >= expected => (Some(actual), MetricStatus::Met),
                Some(actual) => (Some(actual), MetricStatus::BelowThreshold),
                None => (None, MetricStatus::NotNumeric),
            },
        };
        Self {
            key: key.to_string(),
            actual,
            expected,
            status,
        }
    }

    /// Whether the threshold was met.
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.status, MetricStatus::Met)
    }

    /// The error this failed check stands for, if it is a missing metric.
    #[must_use]
    pub fn missing_error(&self) -> Option<Error> {
        match &self.status {
            MetricStatus::Missing { segment } => Some(Error::MissingMetric {
                key: self.key.clone(),
                segment: segment.clone(),
            }),
            _ => None,
        }
    }
}

/// Performance verification of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PerformanceOutcome {
    /// No `performance` block; vacuously complete.
    NotDeclared,
    /// The results file was absent or unparseable.
    ResultsMissing {
        /// Rendered results path.
        path: PathBuf,
        /// Why it could not be used.
        reason: String,
    },
    /// Every declared metric was checked.
    Checked {
        /// One entry per declared metric, in declaration order.
        metrics: Vec<MetricCheck>,
    },
}

impl PerformanceOutcome {
    /// Whether the performance gate is satisfied.
    #[must_use]
    pub fn passed(&self) -> bool {
        match self {
            Self::NotDeclared => true,
            Self::ResultsMissing { .. } => false,
            Self::Checked { metrics } => metrics.iter().all(MetricCheck::passed),
        }
    }
}

/// Split a metric key into path segments. `/` and `.` both separate.
#[must_use]
pub fn metric_path(key: &str) -> Vec<&str> {
    key.split(['/', '.'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Walk `key`'s segments through nested JSON objects.
///
/// # Errors
///
/// Returns [`Error::MissingMetric`] naming the first segment that is absent
/// (or whose parent is not an object).
pub fn lookup_metric<'a>(document: &'a Value, key: &str) -> Result<&'a Value> {
    let segments = metric_path(key);
    if segments.is_empty() {
        return Err(Error::MissingMetric {
            key: key.to_string(),
            segment: String::new(),
        });
    }
    segments.into_iter().try_fold(document, |node, segment| {
        node.as_object()
            .and_then(|map| map.get(segment))
            .ok_or_else(|| Error::MissingMetric {
                key: key.to_string(),
                segment: segment.to_string(),
            })
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
