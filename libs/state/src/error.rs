//! State store error types.

use orca_id::LogIndex;
use thiserror::Error;

/// Errors from state store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The store has been shut down.
    #[error("state store is closed")]
    Closed,

    /// The store did not reach the requested index in time.
    #[error("snapshot at index {requested} unavailable, store is at {latest}")]
    SnapshotUnavailable { requested: LogIndex, latest: LogIndex },

    /// A write arrived with an index older than the store's.
    #[error("write at index {index} is behind store index {latest}")]
    IndexRegression { index: LogIndex, latest: LogIndex },
}

impl StateError {
    /// Whether retrying later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StateError::SnapshotUnavailable { .. })
    }
}
