//! Replicated log commands.
//!
//! The core scheduler never mutates state directly. It emits
//! [`DeleteCommand`]s, grouped into a [`GcBatch`] whose order places every
//! dependent object before the object that owns it, and submits them through
//! the replicated log as one or more size-bounded partitions.

use std::collections::{BTreeMap, HashSet};

use orca_id::{AllocId, DeploymentId, EvalId, JobId, LogIndex, NodeId};
use serde::{Deserialize, Serialize};

use crate::{Allocation, Deployment, Evaluation, Job, Node, ObjectClass, StructsError};

/// Removal of a single object from the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "class", content = "id", rename_all = "snake_case")]
pub enum DeleteCommand {
    Alloc(AllocId),
    Eval(EvalId),
    Node(NodeId),
    Job(JobId),
    Deployment(DeploymentId),
}

impl DeleteCommand {
    pub fn class(&self) -> ObjectClass {
        match self {
            Self::Alloc(_) => ObjectClass::Alloc,
            Self::Eval(_) => ObjectClass::Eval,
            Self::Node(_) => ObjectClass::Node,
            Self::Job(_) => ObjectClass::Job,
            Self::Deployment(_) => ObjectClass::Deployment,
        }
    }
}

impl std::fmt::Display for DeleteCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alloc(id) => write!(f, "delete {id}"),
            Self::Eval(id) => write!(f, "delete {id}"),
            Self::Node(id) => write!(f, "delete {id}"),
            Self::Job(id) => write!(f, "delete {id}"),
            Self::Deployment(id) => write!(f, "delete {id}"),
        }
    }
}

/// Ordered set of deletions produced by one GC pass.
///
/// Commands keep insertion order and duplicates are dropped, so a routine
/// that pushes children before their parent gets that order in every
/// partition submitted to the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcBatch {
    commands: Vec<DeleteCommand>,
    seen: HashSet<DeleteCommand>,
}

impl GcBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command. Returns false if it was already present.
    pub fn push(&mut self, command: DeleteCommand) -> bool {
        if !self.seen.insert(command) {
            return false;
        }
        self.commands.push(command);
        true
    }

    /// Appends every command of `other` that is not yet present.
    pub fn append(&mut self, other: GcBatch) {
        for command in other.commands {
            self.push(command);
        }
    }

    pub fn commands(&self) -> &[DeleteCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of commands per object class.
    pub fn counts(&self) -> BTreeMap<ObjectClass, usize> {
        let mut counts = BTreeMap::new();
        for command in &self.commands {
            *counts.entry(command.class()).or_insert(0) += 1;
        }
        counts
    }

    /// Splits the batch into consecutive partitions of at most `max_ids`
    /// commands each, preserving order.
    pub fn partition(&self, max_ids: usize) -> Vec<Vec<DeleteCommand>> {
        self.commands
            .chunks(max_ids.max(1))
            .map(<[DeleteCommand]>::to_vec)
            .collect()
    }
}

impl FromIterator<DeleteCommand> for GcBatch {
    fn from_iter<T: IntoIterator<Item = DeleteCommand>>(iter: T) -> Self {
        let mut batch = GcBatch::new();
        for command in iter {
            batch.push(command);
        }
        batch
    }
}

/// Payload of one replicated log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LogPayload {
    UpsertJob(Job),
    UpsertEvals(Vec<Evaluation>),
    UpsertAllocs(Vec<Allocation>),
    UpsertNode(Node),
    UpsertDeployment(Deployment),
    Delete(Vec<DeleteCommand>),
}

/// A log entry as it is written to the replicated log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: LogIndex,
    pub payload: LogPayload,
}

impl LogEntry {
    pub fn new(index: LogIndex, payload: LogPayload) -> Self {
        Self { index, payload }
    }

    pub fn encode(&self) -> Result<Vec<u8>, StructsError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StructsError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_dedups_and_keeps_order() {
        let alloc = DeleteCommand::Alloc(AllocId::new());
        let eval = DeleteCommand::Eval(EvalId::new());

        let mut batch = GcBatch::new();
        assert!(batch.push(alloc));
        assert!(batch.push(eval));
        assert!(!batch.push(alloc));

        assert_eq!(batch.commands(), &[alloc, eval]);
        assert_eq!(batch.counts().get(&ObjectClass::Alloc), Some(&1));
        assert_eq!(batch.counts().get(&ObjectClass::Eval), Some(&1));
    }

    #[test]
    fn test_partition_preserves_dependent_first_order() {
        let allocs: Vec<_> = (0..5).map(|_| DeleteCommand::Alloc(AllocId::new())).collect();
        let eval = DeleteCommand::Eval(EvalId::new());
        let batch: GcBatch = allocs.iter().copied().chain([eval]).collect();

        let parts = batch.partition(2);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], allocs[0..2].to_vec());
        assert_eq!(parts[1], allocs[2..4].to_vec());
        assert_eq!(parts[2], vec![allocs[4], eval]);

        let flat: Vec<_> = parts.into_iter().flatten().collect();
        assert_eq!(flat, batch.commands());
    }

    #[test]
    fn test_partition_zero_max_and_empty_batch() {
        let batch: GcBatch = [DeleteCommand::Node(NodeId::new())].into_iter().collect();
        assert_eq!(batch.partition(0).len(), 1);
        assert!(GcBatch::new().partition(10).is_empty());
    }

    #[test]
    fn test_append_skips_commands_already_scheduled() {
        let shared = DeleteCommand::Eval(EvalId::new());
        let mut first: GcBatch = [shared].into_iter().collect();
        let second: GcBatch = [shared, DeleteCommand::Job(JobId::new())]
            .into_iter()
            .collect();
        first.append(second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_log_entry_codec() {
        let entry = LogEntry::new(
            LogIndex::new(42),
            LogPayload::Delete(vec![DeleteCommand::Deployment(DeploymentId::new())]),
        );
        let bytes = entry.encode().unwrap();
        assert_eq!(LogEntry::decode(&bytes).unwrap(), entry);
        assert!(matches!(
            LogEntry::decode(b"not json"),
            Err(StructsError::Codec(_))
        ));
    }
}
