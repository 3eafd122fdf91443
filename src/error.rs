//! Error types for nip-harness
//!
//! Configuration errors abort a whole batch. Everything else is scoped to a
//! single experiment and ends up in its summary.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// nip-harness error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or incomplete experiment table
    #[error("Config error in '{entry}': {reason}")]
    Config {
        /// Experiment name, or `<table>` for top-level problems
        entry: String,
        /// What is wrong with it
        reason: String,
    },

    /// Requested experiment is not in the table
    #[error("Unknown experiment '{0}'\nUse --list to see the experiments defined in the table")]
    UnknownExperiment(String),

    /// Placeholder substitution failed
    #[error("Template error in \"{template}\": {reason}")]
    Template {
        /// Template being rendered
        template: String,
        /// What went wrong
        reason: String,
    },

    /// Spawn failure or unsuccessful exit of the external command
    #[error("Process error: {0}")]
    Process(String),

    /// External command exceeded the configured wall-clock bound
    #[error("Timed out after {0:.1}s; process was terminated")]
    Timeout(f64),

    /// Results file absent or not parseable
    #[error("Missing results file {path}: {reason}")]
    MissingResults {
        /// Rendered results path
        path: PathBuf,
        /// Why it could not be used
        reason: String,
    },

    /// Metric key could not be resolved in the results document
    #[error("Missing metric '{key}': segment '{segment}' not found")]
    MissingMetric {
        /// Declared metric key
        key: String,
        /// First segment that was absent
        segment: String,
    },

    /// Invalid input (run context values, options)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Lifecycle misuse on a run record
    #[error("Invalid run transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Config`] on a named entry.
    pub(crate) fn config(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::Template`].
    pub(crate) fn template(template: &str, reason: impl Into<String>) -> Self {
        Self::Template {
            template: template.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error must abort the whole batch.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::UnknownExperiment(_))
    }
}
