//! File-existence and performance-threshold verification.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::experiment::{
    ExperimentDefinition, FileCheck, MetricCheck, PerformanceOutcome, PerformanceSpec, RunContext,
};
use crate::template::render_positional;
use crate::{Error, Result};

/// Render every `files` template for `ctx` and resolve it against the root.
pub(crate) fn render_files(definition: &ExperimentDefinition, ctx: &RunContext) -> Result<Vec<PathBuf>> {
    definition
        .files()
        .iter()
        .map(|template| render_positional(template, ctx.cam()).map(|p| ctx.resolve(&p)))
        .collect()
}

/// Render the `performance.file` template, if a performance block exists.
pub(crate) fn render_results_path(
    definition: &ExperimentDefinition,
    ctx: &RunContext,
) -> Result<Option<PathBuf>> {
    definition
        .performance()
        .map(|perf| render_positional(perf.file(), ctx.cam()).map(|p| ctx.resolve(&p)))
        .transpose()
}

/// Check existence of every declared output file.
///
/// Returns one entry per template, in declaration order, without
/// short-circuiting on the first missing file.
///
/// # Errors
///
/// Returns [`Error::Template`] if a file template cannot be rendered.
pub fn verify_files(definition: &ExperimentDefinition, ctx: &RunContext) -> Result<Vec<FileCheck>> {
    Ok(check_paths(render_files(definition, ctx)?))
}

pub(crate) fn check_paths(paths: Vec<PathBuf>) -> Vec<FileCheck> {
    paths
        .into_iter()
        .map(|path| {
            let exists = path.exists();
            if !exists {
                tracing::debug!(path = %path.display(), "declared output missing");
            }
            FileCheck { path, exists }
        })
        .collect()
}

/// Check every declared metric threshold against the results file.
///
/// An experiment without a `performance` block yields an empty list. A
/// missing metric fails only its own check.
///
/// # Errors
///
/// Returns [`Error::Template`] if the results path cannot be rendered and
/// [`Error::MissingResults`] if the results file is absent or not JSON.
pub fn verify_performance(
    definition: &ExperimentDefinition,
    ctx: &RunContext,
) -> Result<Vec<MetricCheck>> {
    let (Some(perf), Some(path)) = (definition.performance(), render_results_path(definition, ctx)?)
    else {
        return Ok(Vec::new());
    };
    let document = load_results(&path)?;
    Ok(check_metrics(perf, &document))
}

/// Performance verification folded into an outcome for run records.
pub(crate) fn performance_outcome(
    definition: &ExperimentDefinition,
    results_path: Option<&Path>,
) -> PerformanceOutcome {
    let (Some(perf), Some(path)) = (definition.performance(), results_path) else {
        return PerformanceOutcome::NotDeclared;
    };
    match load_results(path) {
        Ok(document) => PerformanceOutcome::Checked {
            metrics: check_metrics(perf, &document),
        },
        Err(Error::MissingResults { path, reason }) => {
            PerformanceOutcome::ResultsMissing { path, reason }
        }
        Err(other) => PerformanceOutcome::ResultsMissing {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn check_metrics(perf: &PerformanceSpec, document: &Value) -> Vec<MetricCheck> {
    perf.values()
        .iter()
        .map(|(key, &expected)| {
            let check = MetricCheck::evaluate(document, key, expected);
            if !check.passed() {
                tracing::debug!(metric = %key, actual = ?check.actual, expected, "metric check failed");
            }
            check
        })
        .collect()
}

/// Read and parse a results document.
///
/// # Errors
///
/// Returns [`Error::MissingResults`] if the file is absent, unreadable or
/// not valid JSON.
pub fn load_results(path: &Path) -> Result<Value> {
    let missing = |reason: String| Error::MissingResults {
        path: path.to_path_buf(),
        reason,
    };
    let text = fs::read_to_string(path).map_err(|e| missing(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| missing(format!("not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::MetricStatus;

    fn definition() -> ExperimentDefinition {
        ExperimentDefinition::builder("exp", "true")
            .file("out/{}/a.txt")
            .file("out/{}/b.txt")
            .performance(
                PerformanceSpec::new("out/{}/progress.json")
                    .threshold("a/b", 1.0)
                    .threshold("c/d", 2.0),
            )
            .build()
    }

    #[test]
    fn test_verify_files_reports_all() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new("D90", dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("out/D90")).unwrap();
        fs::write(dir.path().join("out/D90/b.txt"), "").unwrap();

        let checks = verify_files(&definition(), &ctx).unwrap();
        assert_eq!(checks.len(), 2);
        assert!(!checks[0].exists);
        assert!(checks[1].exists);
        assert_eq!(checks[1].path, dir.path().join("out/D90/b.txt"));
    }

    #[test]
    fn test_missing_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new("D90", dir.path()).unwrap();
        assert!(matches!(
            verify_performance(&definition(), &ctx),
            Err(Error::MissingResults { .. })
        ));
    }

    #[test]
    fn test_unparseable_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new("D90", dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("out/D90")).unwrap();
        fs::write(dir.path().join("out/D90/progress.json"), "{not json").unwrap();
        let outcome = performance_outcome(
            &definition(),
            Some(&dir.path().join("out/D90/progress.json")),
        );
        assert!(matches!(outcome, PerformanceOutcome::ResultsMissing { .. }));
        assert!(!outcome.passed());
    }

    #[test]
    fn test_missing_metric_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new("D90", dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("out/D90")).unwrap();
        fs::write(dir.path().join("out/D90/progress.json"), r#"{"a": {"b": 1}}"#).unwrap();

        let checks = verify_performance(&definition(), &ctx).unwrap();
        assert_eq!(checks.len(), 2);
        assert!(checks[0].passed());
        assert_eq!(
            checks[1].status,
            MetricStatus::Missing {
                segment: "c".into()
            }
        );
    }

    #[test]
    fn test_no_performance_block_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new("D90", dir.path()).unwrap();
        let def = ExperimentDefinition::builder("exp", "true").build();
        assert!(verify_performance(&def, &ctx).unwrap().is_empty());
        assert_eq!(performance_outcome(&def, None), PerformanceOutcome::NotDeclared);
    }
}
