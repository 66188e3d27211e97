//! Replicated log seam.
//!
//! The core scheduler submits deletions through [`LogApplier`]; consensus
//! and replication live behind it. [`LocalLog`] is the single-member
//! implementation used by the binary and the tests.

mod local;

use async_trait::async_trait;
use orca_id::LogIndex;
use orca_state::StateError;
use orca_structs::{DeleteCommand, StructsError};
use thiserror::Error;

pub use local::LocalLog;

/// Errors from submitting commands to the log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// This member cannot accept writes.
    #[error("not the cluster leader")]
    NotLeader,

    /// The log did not commit the entry in time.
    #[error("log apply timed out")]
    Timeout,

    /// The log refuses further entries.
    #[error("log is full ({0} entries)")]
    LogFull(u64),

    /// The state machine rejected the entry.
    #[error("state machine rejected entry: {0}")]
    State(#[from] StateError),

    /// The entry could not be encoded.
    #[error(transparent)]
    Codec(#[from] StructsError),
}

impl ApplyError {
    /// Whether a later pass can expect to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApplyError::NotLeader | ApplyError::Timeout | ApplyError::LogFull(_) => true,
            ApplyError::State(e) => e.is_retryable(),
            ApplyError::Codec(_) => false,
        }
    }
}

/// Replicated command application.
#[async_trait]
pub trait LogApplier: Send + Sync {
    /// Submits one batch of deletions as a single log entry and returns the
    /// index it was applied at. Commands are applied in order.
    async fn apply_batch(&self, commands: Vec<DeleteCommand>) -> Result<LogIndex, ApplyError>;

    /// Index of the latest entry committed to the log.
    fn last_index(&self) -> LogIndex;
}
