//! Typed ID definitions for cluster objects.
//!
//! Each ID type has a unique prefix that identifies the object class.

use crate::define_id;

// =============================================================================
// Scheduling
// =============================================================================

define_id!(JobId, "job");
define_id!(EvalId, "eval");
define_id!(AllocId, "alloc");
define_id!(DeploymentId, "deploy");

// =============================================================================
// Cluster Members
// =============================================================================

define_id!(NodeId, "node");

// =============================================================================
// Replicated Log
// =============================================================================

/// Position in the replicated command log.
///
/// Indexes are assigned by the log in strictly increasing order and act as
/// the cluster-wide logical clock. Every stored object records the index of
/// the write that last modified it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogIndex(u64);

impl LogIndex {
    /// The index before any entry has been applied.
    pub const ZERO: Self = Self(0);

    /// Creates a LogIndex from a raw u64.
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the underlying u64 value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the index following this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for LogIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LogIndex {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

impl From<LogIndex> for u64 {
    fn from(index: LogIndex) -> Self {
        index.0
    }
}

impl serde::Serialize for LogIndex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for LogIndex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Self)
    }
}

// =============================================================================
// Tests
// =============================================================================
