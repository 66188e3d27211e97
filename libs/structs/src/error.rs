//! Error types for the shared object model.

use thiserror::Error;

/// Errors raised while decoding object model values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructsError {
    /// The core job type name is unknown.
    #[error("unknown core job type: {0}")]
    UnknownCoreJobType(String),

    /// A log entry could not be encoded or decoded.
    #[error("log entry codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for StructsError {
    fn from(err: serde_json::Error) -> Self {
        StructsError::Codec(err.to_string())
    }
}
