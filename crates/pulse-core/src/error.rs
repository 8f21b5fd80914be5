//! Error types shared by every crate in the workspace.

use thiserror::Error;

/// Result alias using the workspace [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the boundaries of the benchmark.
///
/// The detection engine itself never fails on well-formed input: short series
/// and undefined bounds are normal outcomes, not errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Input series rejected before reaching the engine
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failure for reports and configuration
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Run abandoned between frequency passes
    #[error("Benchmark cancelled after {completed} of {total} frequency passes")]
    Cancelled { completed: usize, total: usize },
}

impl Error {
    /// Build a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Build a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Whether the error was caused by malformed input data
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}
