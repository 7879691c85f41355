//! Error types for Pagewatch.
//!
//! Library crates use [`PagewatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Pagewatch operations.
#[derive(Debug, thiserror::Error)]
pub enum PagewatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/transport error during a fetch.
    #[error("network error: {0}")]
    Network(String),

    /// The target responded with a non-success HTTP status.
    #[error("{url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Database error (snapshot store or target registry).
    #[error("storage error: {0}")]
    Storage(String),

    /// Summarization backend error (API or response parsing).
    /// Never propagated out of the summarizer; it degrades instead.
    #[error("summarization error: {0}")]
    Summarization(String),

    /// Alert delivery transport error.
    #[error("notification error: {0}")]
    Notification(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid URL, bad status string, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagewatchError>;

impl PagewatchError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
