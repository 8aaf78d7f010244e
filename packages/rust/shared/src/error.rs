//! Error types for JobLens.
//!
//! Library crates use [`JobLensError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all JobLens operations.
#[derive(Debug, thiserror::Error)]
pub enum JobLensError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to a page or the classification service.
    #[error("network error: {0}")]
    Network(String),

    /// Structured payload could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Headless rendering failure.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed table, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The source table lacks a column the pipeline cannot run without.
    #[error("required column '{column}' not found in {path:?}")]
    MissingColumn { column: String, path: PathBuf },

    /// The output file stayed locked by another process through every save attempt.
    #[error(
        "{path:?} is busy after {attempts} save attempts; close the file in any \
         spreadsheet application or viewer that holds it open and re-run"
    )]
    ResourceBusy { path: PathBuf, attempts: u32 },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, JobLensError>;

impl JobLensError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
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

    /// Errors that stop a run before any row is processed.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::MissingColumn { .. } | Self::Validation { .. }
        )
    }
}
