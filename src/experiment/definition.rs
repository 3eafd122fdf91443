//! Experiment Definition - one named entry of the experiment table

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Performance gate of an experiment.
///
/// `file` is a positional path template (`{}` is the camera name) pointing at
/// a JSON results document; `values` maps a metric path such as
/// `Performance/psnr` to the minimum acceptable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSpec {
    file: String,
    values: IndexMap<String, f64>,
}

impl PerformanceSpec {
    /// Create a performance gate with no thresholds yet.
    #[must_use]
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            values: IndexMap::new(),
        }
    }

    /// Add a `metric >= threshold` requirement.
    #[must_use]
    pub fn threshold(mut self, metric: impl Into<String>, minimum: f64) -> Self {
        self.values.insert(metric.into(), minimum);
        self
    }

    /// Results file template.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Declared thresholds, in declaration order.
    #[must_use]
    pub const fn values(&self) -> &IndexMap<String, f64> {
        &self.values
    }
}

/// A reproducible training/evaluation recipe with declared outputs and a
/// performance bar.
///
/// Definitions are read-only once loaded; they are only built through
/// [`ExperimentTable`](super::ExperimentTable) or [`ExperimentDefinitionBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    #[serde(skip)]
    name: String,
    log: String,
    command: String,
    files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    performance: Option<PerformanceSpec>,
}

impl ExperimentDefinition {
    /// Create a builder for an experiment named `name` running `command`.
    #[must_use]
    pub fn builder(name: impl Into<String>, command: impl Into<String>) -> ExperimentDefinitionBuilder {
        ExperimentDefinitionBuilder::new(name, command)
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Experiment name (table key).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log path template (named placeholders, relative to the output root).
    #[must_use]
    pub fn log(&self) -> &str {
        &self.log
    }

    /// Command template (named placeholders).
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Required output file templates (positional placeholder).
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Performance gate, if declared.
    #[must_use]
    pub const fn performance(&self) -> Option<&PerformanceSpec> {
        self.performance.as_ref()
    }
}

/// Builder for `ExperimentDefinition`.
#[derive(Debug)]
pub struct ExperimentDefinitionBuilder {
    name: String,
    log: Option<String>,
    command: String,
    files: Vec<String>,
    performance: Option<PerformanceSpec>,
}

impl ExperimentDefinitionBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: None,
            command: command.into(),
            files: Vec::new(),
            performance: None,
        }
    }

    /// Set the log path template. Defaults to `<name>.log`.
    #[must_use]
    pub fn log(mut self, log: impl Into<String>) -> Self {
        self.log = Some(log.into());
        self
    }

    /// Append a required output file template.
    #[must_use]
    pub fn file(mut self, template: impl Into<String>) -> Self {
        self.files.push(template.into());
        self
    }

    /// Set the performance gate.
    #[must_use]
    pub fn performance(mut self, performance: PerformanceSpec) -> Self {
        self.performance = Some(performance);
        self
    }

    /// Build the `ExperimentDefinition`.
    #[must_use]
    pub fn build(self) -> ExperimentDefinition {
        let log = self.log.unwrap_or_else(|| format!("{}.log", self.name));
        ExperimentDefinition {
            name: self.name,
            log,
            command: self.command,
            files: self.files,
            performance: self.performance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let def = ExperimentDefinition::builder("train-nip", "python3 train_nip.py").build();
        assert_eq!(def.name(), "train-nip");
        assert_eq!(def.log(), "train-nip.log");
        assert!(def.files().is_empty());
        assert!(def.performance().is_none());
    }

    #[test]
    fn test_performance_keeps_declaration_order() {
        let perf = PerformanceSpec::new("{}/progress.json")
            .threshold("z/last", 1.0)
            .threshold("a/first", 2.0);
        let keys: Vec<&String> = perf.values().keys().collect();
        assert_eq!(keys, ["z/last", "a/first"]);
    }
}
