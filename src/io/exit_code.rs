//! Exit codes for CLI operations following Unix conventions.
//!
//! - `0`: success
//! - `1`: unspecified failure
//! - `2`: blocking error, automation should stop
//! - `3-125`: specific recoverable errors

use crate::error::SearchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Critical error that should halt automation
    BlockingError = 2,
    /// Query answered with no hits
    NotFound = 3,
    /// Corpus could not be read as a table
    ParseError = 4,
    IoError = 5,
    /// Bad flag or configuration value
    ConfigError = 6,
    /// Container or index file does not match its declared layout
    IndexCorrupted = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// `Success` when a query returned hits, `NotFound` otherwise.
    pub fn from_hits<T>(hits: &[T]) -> Self {
        if hits.is_empty() {
            ExitCode::NotFound
        } else {
            ExitCode::Success
        }
    }

    /// Maps a library error to the code scripts should branch on.
    pub fn from_error(error: &SearchError) -> Self {
        match error {
            SearchError::Io { .. } => ExitCode::IoError,
            SearchError::CorpusFormat { .. } => ExitCode::ParseError,
            SearchError::Schema { .. } => ExitCode::IndexCorrupted,
            SearchError::InvalidArgument { .. } => ExitCode::ConfigError,

            // Mixing models or dimensions poisons every later step
            SearchError::DimensionMismatch { .. } => ExitCode::BlockingError,

            SearchError::State { .. } | SearchError::Embedding(_) => ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - automation should halt",
            ExitCode::NotFound => "Not found",
            ExitCode::ParseError => "Parse error",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::IndexCorrupted => "Index corrupted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as u8, 0);
        assert_eq!(ExitCode::GeneralError as u8, 1);
        assert_eq!(ExitCode::BlockingError as u8, 2);
        assert_eq!(ExitCode::NotFound as u8, 3);
        assert_eq!(i32::from(ExitCode::IndexCorrupted), 7);
    }

    #[test]
    fn test_from_hits() {
        assert_eq!(ExitCode::from_hits(&[1, 2]), ExitCode::Success);
        assert_eq!(ExitCode::from_hits::<u32>(&[]), ExitCode::NotFound);
    }

    #[test]
    fn test_from_error() {
        let corrupt = SearchError::schema(PathBuf::from("a.bin"), "bad magic");
        assert_eq!(ExitCode::from_error(&corrupt), ExitCode::IndexCorrupted);

        let mismatch = SearchError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert!(ExitCode::from_error(&mismatch).is_blocking());

        let bad_k = SearchError::invalid_argument("k must be positive");
        assert_eq!(ExitCode::from_error(&bad_k), ExitCode::ConfigError);
    }

    #[test]
    fn test_is_success() {
        assert!(ExitCode::Success.is_success());
        assert!(!ExitCode::NotFound.is_success());
        assert!(!ExitCode::GeneralError.is_success());
    }
}
