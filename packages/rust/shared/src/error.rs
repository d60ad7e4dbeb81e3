//! Error types for Hireflow.
//!
//! Library crates use [`HireflowError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Hireflow operations.
#[derive(Debug, thiserror::Error)]
pub enum HireflowError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Data validation error (missing dedup key, malformed record).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Data source collaborator failure (fetch or decode).
    #[error("source error: {0}")]
    Source(String),

    /// Attachment storage collaborator failure (resolve, download, extract).
    #[error("attachment error: {0}")]
    Attachment(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Language-model collaborator failure (transport or provider).
    #[error("llm error: {0}")]
    Llm(String),

    /// LLM output did not contain the expected bracketed structure.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HireflowError>;

impl HireflowError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
