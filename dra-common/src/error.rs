//! Common error types for the retraining pipeline

use thiserror::Error;

/// Common result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the pipeline stages and the serving API.
///
/// `Parse` is the only per-file error: ingestion isolates it and keeps going.
/// Every other variant aborts the stage that raised it.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing model, dataset, ledger or other artifact
    #[error("Not found: {0}")]
    NotFound(String),

    /// Expected columns absent or values of the wrong type
    #[error("Schema error: {0}")]
    Schema(String),

    /// A single candidate source file could not be read as a table
    #[error("Parse error in {file}: {reason}")]
    Parse { file: String, reason: String },

    /// Ledger, score record or dataset contents contradict each other
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a per-file parse error
    pub fn parse(file: impl Into<String>, reason: impl ToString) -> Self {
        Error::Parse {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the caller may retry the whole cycle later without intervention
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Io(_))
    }
}
