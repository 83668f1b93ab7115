//! Error types for TransFit enrichment.
//!
//! Library crates use [`TransfitError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all enrichment operations.
#[derive(Debug, thiserror::Error)]
pub enum TransfitError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A required credential or setting is absent. Fatal before any work starts.
    #[error("missing dependency: {name} is not set")]
    MissingDependency { name: String },

    /// The research or exercise store could not be read. Fatal for the run.
    #[error("upstream read error: {0}")]
    UpstreamRead(String),

    /// The content generator failed or returned an unusable object.
    #[error("generation error: {0}")]
    Generation(String),

    /// A write to the tip store (or research store) failed. Aborts the batch.
    #[error("persistence write error: {0}")]
    PersistenceWrite(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Network/HTTP error.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TransfitError>;

impl TransfitError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a missing-dependency error naming the absent setting.
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingDependency { name: name.into() }
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

    /// Re-classify a storage failure that happened while loading run inputs.
    pub fn into_upstream_read(self) -> Self {
        match self {
            Self::Storage(msg) => Self::UpstreamRead(msg),
            other => other,
        }
    }

    /// Re-classify a storage failure that happened while writing results.
    pub fn into_persistence_write(self) -> Self {
        match self {
            Self::Storage(msg) => Self::PersistenceWrite(msg),
            other => other,
        }
    }

    /// Whether the batch may continue past this error.
    ///
    /// Only generation failures are skippable; everything else stops the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Generation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = TransfitError::config("bad toml");
        assert_eq!(err.to_string(), "config error: bad toml");

        let err = TransfitError::missing("OPENAI_API_KEY");
        assert_eq!(
            err.to_string(),
            "missing dependency: OPENAI_API_KEY is not set"
        );
    }

    #[test]
    fn storage_errors_reclassify_by_phase() {
        let read = TransfitError::Storage("no such table".into()).into_upstream_read();
        assert!(matches!(read, TransfitError::UpstreamRead(_)));

        let write = TransfitError::Storage("disk full".into()).into_persistence_write();
        assert!(matches!(write, TransfitError::PersistenceWrite(_)));

        // Non-storage errors pass through untouched.
        let other = TransfitError::validation("x").into_upstream_read();
        assert!(matches!(other, TransfitError::Validation { .. }));
    }

    #[test]
    fn only_generation_errors_are_recoverable() {
        assert!(TransfitError::Generation("timeout".into()).is_recoverable());
        assert!(!TransfitError::PersistenceWrite("x".into()).is_recoverable());
        assert!(!TransfitError::UpstreamRead("x".into()).is_recoverable());
        assert!(!TransfitError::missing("KEY").is_recoverable());
    }
}
