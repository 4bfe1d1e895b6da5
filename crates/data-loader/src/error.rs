//! Error types for the data-loader crate.
//!
//! `FileNotFound`, `IoError` and `UserNotFound` are fatal for a run: the
//! coordinator refuses to open its listener until the dataset is loaded and
//! the target user resolved. Row-level `ParseError`/`FieldCountMismatch` are
//! logged by the parser and the row is dropped.

use thiserror::Error;

/// Errors that can occur while loading the ratings dataset
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in data file couldn't be parsed
    ///
    /// This variant stores context about where the error occurred
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// Expected number of fields in a line doesn't match actual
    #[error("Expected {expected} fields but found {found} in line {line}")]
    FieldCountMismatch {
        expected: usize,
        found: usize,
        line: usize,
    },

    /// The requested user has no ratings in the loaded dataset
    #[error("User {user_id} not found in dataset")]
    UserNotFound { user_id: String },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
