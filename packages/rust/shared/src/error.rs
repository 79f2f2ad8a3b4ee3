//! Error types for catalogsync.
//!
//! Library crates use [`CatalogSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all catalogsync operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogSyncError {
    /// A required input file (catalog, feed, price list) does not exist.
    #[error("missing {what}: {path:?} not found")]
    MissingSource { what: String, path: PathBuf },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Feed or catalog parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The generation capability failed or returned nothing for one request.
    #[error("generation error: {0}")]
    Generation(String),

    /// A snapshot could not be written, not even as a backup.
    #[error("persistence error at {path:?}: {message}")]
    Persistence { path: PathBuf, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad delimiter, unknown column, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CatalogSyncError>;

impl CatalogSyncError {
    /// Create a missing-source error for the named input.
    pub fn missing_source(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingSource {
            what: what.into(),
            path: path.into(),
        }
    }

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

    /// Create a persistence error for a snapshot that could not be saved.
    pub fn persistence(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CatalogSyncError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = CatalogSyncError::missing_source("feed document", "feed.xml");
        assert!(err.to_string().contains("missing feed document"));
        assert!(err.to_string().contains("feed.xml"));
    }
}
