//! Error types for the semantic index subsystem
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for embedding, record store, index and query operations
#[derive(Error, Debug)]
pub enum SearchError {
    /// File system errors on the crate's own artifacts
    #[error("I/O failure on '{path}': {source}\nSuggestion: Check that the path exists and you have read/write permissions")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Missing or malformed schema, or data that disagrees with its schema
    #[error("Schema error in '{path}': {reason}\nSuggestion: Regenerate the container with the embed command")]
    Schema { path: PathBuf, reason: String },

    /// Corpus file is unusable as a whole (missing header, missing column)
    #[error("Corpus format error in '{path}': {reason}")]
    CorpusFormat { path: PathBuf, reason: String },

    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    /// Operation called in the wrong index lifecycle state
    #[error("Invalid index state: {reason}")]
    State { reason: String },

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is properly initialized"
    )]
    Embedding(String),

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

impl SearchError {
    /// Build an `Io` error bound to the path that failed.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a `Schema` error for the given container or index file.
    pub fn schema(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Schema {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn corpus(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::CorpusFormat {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn state(reason: impl Into<String>) -> Self {
        Self::State {
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::Io { .. } => "IO_ERROR",
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::CorpusFormat { .. } => "CORPUS_FORMAT_ERROR",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::State { .. } => "STATE_ERROR",
            Self::Embedding(_) => "EMBEDDING_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Schema { .. } => vec![
                "Run 'lyrics-search embed' again to rewrite the container and its schema",
                "Make sure the '.schema.json' sidecar sits next to the data file",
            ],
            Self::CorpusFormat { .. } => vec![
                "Check that the corpus is tab-separated with a header row",
                "Pass the right column with --text-column",
            ],
            Self::DimensionMismatch { .. } => vec![
                "Build the index with the dimension reported by the embedding model",
                "Re-embed every container with the same model",
            ],
            Self::State { .. } => vec!["Call build() exactly once, after all insertions"],
            Self::Io { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Check disk space for output files",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for semantic index operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Helper trait for attaching a path to raw I/O failures
pub trait IoContext<T> {
    fn with_path(self, path: &Path) -> SearchResult<T>;
}

impl<T> IoContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: &Path) -> SearchResult<T> {
        self.map_err(|e| SearchError::io(path, e))
    }
}
