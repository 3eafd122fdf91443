//! Experiment Table - the immutable, name-keyed set of experiment definitions
//!
//! The table is a JSON object whose keys are experiment names:
//!
//! ```json
//! {
//!   "train-nip": {
//!     "log": "train-nip.log",
//!     "command": "python3 train_nip.py --cam \"{cam}\" --out {root}/nip_snapshots",
//!     "files": ["nip_snapshots/{}/inet/progress.json"],
//!     "performance": {
//!       "file": "nip_snapshots/{}/inet/progress.json",
//!       "values": {"Performance/psnr": 40}
//!     }
//!   }
//! }
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::ExperimentDefinition;
use crate::{Error, Result};

const TABLE: &str = "<table>";
const REQUIRED_FIELDS: [&str; 3] = ["log", "command", "files"];

/// Parse an experiment table from JSON text.
///
/// Equivalent to [`ExperimentTable::from_json_str`].
///
/// # Errors
///
/// Returns [`Error::Config`] if the source is not valid JSON, is not an
/// object, or an entry is missing `log`, `command` or `files`.
pub fn load_definitions(source: &str) -> Result<ExperimentTable> {
    ExperimentTable::from_json_str(source)
}

/// Read-only mapping from experiment name to definition.
///
/// Iteration follows the order in which experiments appear in the source
/// document, which is also the default run order.
#[derive(Debug, Clone, Default)]
pub struct ExperimentTable {
    experiments: IndexMap<String, ExperimentDefinition>,
}

impl ExperimentTable {
    /// Parse a table from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending entry and field.
    pub fn from_json_str(source: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(source)
            .map_err(|e| Error::config(TABLE, format!("not valid JSON: {e}")))?;
        let entries = root
            .as_object()
            .ok_or_else(|| Error::config(TABLE, "top level must be an object keyed by experiment name"))?;

        let mut experiments = IndexMap::with_capacity(entries.len());
        for (name, entry) in entries {
            let definition = parse_entry(name, entry)?;
            experiments.insert(name.clone(), definition);
        }

        tracing::debug!(experiments = experiments.len(), "experiment table parsed");
        Ok(Self { experiments })
    }

    /// Read and parse a table file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::config(TABLE, format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&source)
    }

    /// Build a table from already constructed definitions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on duplicate names.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ExperimentDefinition>,
    ) -> Result<Self> {
        let mut experiments = IndexMap::new();
        for definition in definitions {
            let name = definition.name().to_string();
            if experiments.contains_key(&name) {
                return Err(Error::config(name, "duplicate experiment name"));
            }
            experiments.insert(name, definition);
        }
        Ok(Self { experiments })
    }

    /// Check if the table has no experiments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Number of experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Get an experiment by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ExperimentDefinition> {
        self.experiments.get(name)
    }

    /// Get an experiment by name, failing if it is not defined.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownExperiment`].
    pub fn resolve(&self, name: &str) -> Result<&ExperimentDefinition> {
        self.get(name)
            .ok_or_else(|| Error::UnknownExperiment(name.to_string()))
    }

    /// Resolve every name before anything runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownExperiment`] for the first undefined name.
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&ExperimentDefinition>> {
        names.iter().map(|name| self.resolve(name.as_ref())).collect()
    }

    /// Experiment names in table order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.experiments.keys().map(String::as_str)
    }

    /// Definitions in table order.
    pub fn iter(&self) -> impl Iterator<Item = &ExperimentDefinition> {
        self.experiments.values()
    }
}

fn parse_entry(name: &str, entry: &Value) -> Result<ExperimentDefinition> {
    let fields = entry
        .as_object()
        .ok_or_else(|| Error::config(name, "entry must be an object"))?;

    for field in REQUIRED_FIELDS {
        if !fields.contains_key(field) {
            return Err(Error::config(name, format!("missing required field '{field}'")));
        }
    }
    expect_string(name, fields, "log")?;
    expect_string(name, fields, "command")?;

    let files = fields["files"]
        .as_array()
        .ok_or_else(|| Error::config(name, "'files' must be an array of path templates"))?;
    if let Some(index) = files.iter().position(|f| !f.is_string()) {
        return Err(Error::config(name, format!("files[{index}] must be a string")));
    }

    match fields.get("performance") {
        None | Some(Value::Null) => {}
        Some(Value::Object(performance)) => check_performance(name, performance)?,
        Some(_) => return Err(Error::config(name, "'performance' must be an object")),
    }

    let definition: ExperimentDefinition = serde_json::from_value(entry.clone())
        .map_err(|e| Error::config(name, e.to_string()))?;
    Ok(definition.with_name(name))
}

fn expect_string(name: &str, fields: &Map<String, Value>, field: &str) -> Result<()> {
    if fields[field].is_string() {
        Ok(())
    } else {
        Err(Error::config(name, format!("'{field}' must be a string")))
    }
}

fn check_performance(name: &str, performance: &Map<String, Value>) -> Result<()> {
    match performance.get("file") {
        Some(Value::String(_)) => {}
        Some(_) => return Err(Error::config(name, "'performance.file' must be a string")),
        None => return Err(Error::config(name, "missing required field 'performance.file'")),
    }
    let values = performance
        .get("values")
        .ok_or_else(|| Error::config(name, "missing required field 'performance.values'"))?
        .as_object()
        .ok_or_else(|| Error::config(name, "'performance.values' must be an object"))?;
    for (metric, threshold) in values {
        if !threshold.is_number() {
            return Err(Error::config(
                name,
                format!("performance.values['{metric}'] must be a number"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "train-nip": {
            "log": "train-nip.log",
            "command": "python3 train_nip.py --cam \"{cam}\"",
            "files": ["nip_snapshots/{}/inet/progress.json"],
            "performance": {
                "file": "nip_snapshots/{}/inet/progress.json",
                "values": {"Performance/psnr": 40}
            }
        },
        "summary": {
            "log": "summary.log",
            "command": "python3 summarize.py",
            "files": []
        }
    }"#;

    #[test]
    fn test_table_default() {
        let table = ExperimentTable::default();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_load_sample() {
        let table = load_definitions(SAMPLE).unwrap();
        assert_eq!(table.len(), 2);
        let nip = table.get("train-nip").unwrap();
        assert_eq!(nip.name(), "train-nip");
        assert_eq!(nip.files().len(), 1);
        let perf = nip.performance().unwrap();
        assert!((perf.values()["Performance/psnr"] - 40.0).abs() < f64::EPSILON);
        assert!(table.get("summary").unwrap().performance().is_none());
    }

    #[test]
    fn test_table_order_is_document_order() {
        let table = load_definitions(SAMPLE).unwrap();
        let names: Vec<&str> = table.names().collect();
        assert_eq!(names, ["train-nip", "summary"]);
    }

    #[test]
    fn test_missing_required_field() {
        let err = load_definitions(r#"{"x": {"log": "x.log", "files": []}}"#).unwrap_err();
        assert!(matches!(err, Error::Config { ref entry, .. } if entry == "x"));
        assert!(err.to_string().contains("command"));
    }

    #[test]
    fn test_resolve_unknown() {
        let table = load_definitions(SAMPLE).unwrap();
        assert!(matches!(
            table.resolve("train-fan"),
            Err(Error::UnknownExperiment(_))
        ));
    }
}
