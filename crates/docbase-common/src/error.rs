//! Error types for docbase
//!
//! This module defines the common error types used throughout the storage engine.

use std::path::PathBuf;

use thiserror::Error;

/// Common result type for docbase operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for docbase
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("not found: {0}")]
    NotFoundError(String),

    #[error("already exists: {0}")]
    AlreadyExistsError(String),

    #[error("authorization failed: wrong drop key for table '{table}'")]
    AuthorizationError { table: String },

    #[error("table '{0}' has been dropped")]
    TableDroppedError(String),

    #[error("io error at {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt chunk file: {path}")]
    CorruptChunkError { path: PathBuf },

    #[error("value could not be encoded: {0}")]
    CodecError(String),

    #[error("no such index: '{0}'")]
    NoSuchIndexError(String),

    #[error("table '{0}' has no chunks")]
    EmptyTableError(String),
}

impl Error {
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFoundError(msg.into())
    }

    #[must_use]
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExistsError(msg.into())
    }

    #[must_use]
    pub fn corrupt_chunk(path: impl Into<PathBuf>) -> Self {
        Self::CorruptChunkError { path: path.into() }
    }

    #[must_use]
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::CodecError(msg.into())
    }

    /// Check if this is a not-found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFoundError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_variants_have_distinct_display() {
        let samples: Vec<Error> = vec![
            Error::config("bad chunk_size"),
            Error::not_found("dir missing"),
            Error::already_exists("db"),
            Error::AuthorizationError { table: "t".into() },
            Error::TableDroppedError("t".into()),
            Error::io("chunk-0001", std::io::Error::other("boom")),
            Error::corrupt_chunk("chunk-0001"),
            Error::codec("cannot encode value"),
            Error::NoSuchIndexError("age".into()),
            Error::EmptyTableError("t".into()),
        ];
        let mut seen = std::collections::HashSet::new();
        for err in &samples {
            let text = err.to_string();
            assert!(!text.is_empty());
            assert!(seen.insert(text), "duplicate display text for {err:?}");
        }
    }

    #[test]
    fn test_error_not_found() {
        assert!(Error::not_found("x").is_not_found());
        assert!(!Error::config("x").is_not_found());
    }
}
