//! Error types for the benchmark harness
//!
//! Only configuration problems, missing frameworks and run-level aborts surface
//! through [`Error`]. Ordinary extraction failures are normalized into
//! [`ExtractionOutcome`](crate::types::ExtractionOutcome) records instead and
//! never travel through this type unless `continue_on_error` is disabled.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for benchmark harness operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during benchmark operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid TOML in a configuration file
    #[error("TOML error in {path}: {message}")]
    Toml { path: PathBuf, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Framework is known but cannot run on this machine
    #[error("Framework '{framework}' is unavailable: {reason}")]
    FrameworkUnavailable { framework: String, reason: String },

    /// Framework identifier is not registered at all
    #[error("Unknown framework: {0}")]
    UnknownFramework(String),

    /// Test document directory not found
    #[error("Corpus directory not found: {0}")]
    CorpusNotFound(PathBuf),

    /// Extraction failed after exhausting retries with `continue_on_error = false`
    #[error("Framework '{framework}' failed on {file}: {kind}: {message}")]
    ExtractionFailed {
        framework: String,
        file: PathBuf,
        kind: String,
        message: String,
    },

    /// The run was cancelled before it completed
    #[error("Benchmark interrupted after {completed} outcome(s)")]
    Interrupted { completed: usize },

    /// Benchmark execution error
    #[error("Benchmark error: {0}")]
    Benchmark(String),
}

impl Error {
    /// Whether this error aborted a run that still holds partial results worth persisting.
    pub fn has_partial_results(&self) -> bool {
        matches!(self, Error::ExtractionFailed { .. } | Error::Interrupted { .. })
    }
}
