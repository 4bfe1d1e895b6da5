//! Errors raised while reading or writing protocol lines.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Underlying socket read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before sending the sentinel
    #[error("Stream ended before the END sentinel")]
    UnexpectedEof,

    /// The shard stream did not start with a `UserID:` header
    #[error("Missing UserID header")]
    MissingHeader,

    /// A `userID,movieID,score` line could not be parsed
    #[error("Malformed rating line {line:?}: {reason}")]
    MalformedRating { line: String, reason: String },

    /// A `<movieID> <score>` line could not be parsed
    #[error("Malformed result line {line:?}: {reason}")]
    MalformedResult { line: String, reason: String },
}

impl ProtocolError {
    /// Parse errors are per-line and never end a session
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedRating { .. } | ProtocolError::MalformedResult { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
