//! Error types for the coordinator.
//!
//! `CoordinatorError` covers failures that stop a run before any shard is
//! sent. `SessionError` covers a single worker connection; it is recorded in
//! that session's outcome and never propagates to the other sessions.

use std::time::Duration;

use data_loader::DataLoadError;
use protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Dataset could not be loaded or the target user is absent
    #[error("Dataset error: {0}")]
    Dataset(#[from] DataLoadError),

    #[error("Number of shards must be at least 1, got {0}")]
    InvalidShardCount(usize),

    /// Partitioning needs at least one target rating to replicate
    #[error("Target user has no ratings to replicate into shards")]
    EmptyTarget,

    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// Accept, read or write failure on the worker connection
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The peer violated the framing (e.g. closed before the sentinel)
    #[error("Protocol error: {0}")]
    Protocol(#[source] ProtocolError),

    /// No progress within the per-session I/O deadline
    #[error("Timed out after {after:?} while {phase}")]
    Timeout { phase: &'static str, after: Duration },
}

impl From<ProtocolError> for SessionError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Io(e) => SessionError::Connection(e),
            other => SessionError::Protocol(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
