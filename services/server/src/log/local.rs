//! Single-member log.
//!
//! Entries are encoded as they would be for replication, then decoded and
//! applied to the state store by the same process. Every applied entry is
//! witnessed in the time table, which is how the table learns the mapping
//! between log indexes and wall-clock time.

use std::sync::Arc;

use async_trait::async_trait;
use orca_id::LogIndex;
use orca_state::StateStore;
use orca_structs::{
    Allocation, DeleteCommand, Deployment, Evaluation, Job, LogEntry, LogPayload, Node,
};
use orca_timetable::{Clock, TimeTable};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ApplyError, LogApplier};

pub struct LocalLog {
    store: Arc<StateStore>,
    time_table: Arc<TimeTable>,
    clock: Arc<dyn Clock>,
    /// Serializes appends; holds the number of entries applied so far.
    appended: Mutex<u64>,
    max_entries: Option<u64>,
}

impl LocalLog {
    pub fn new(store: Arc<StateStore>, time_table: Arc<TimeTable>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            time_table,
            clock,
            appended: Mutex::new(0),
            max_entries: None,
        }
    }

    /// Refuses entries once `max` have been appended.
    pub fn with_max_entries(mut self, max: u64) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Appends and applies one entry, returning its index.
    pub async fn apply(&self, payload: LogPayload) -> Result<LogIndex, ApplyError> {
        let mut appended = self.appended.lock().await;
        if let Some(max) = self.max_entries {
            if *appended >= max {
                return Err(ApplyError::LogFull(max));
            }
        }

        let index = self.store.latest_index().next();
        let bytes = LogEntry::new(index, payload).encode()?;
        debug!(%index, entry_bytes = bytes.len(), "Appending log entry");

        self.apply_entry(&bytes)?;
        *appended += 1;
        Ok(index)
    }

    pub async fn upsert_job(&self, job: Job) -> Result<LogIndex, ApplyError> {
        self.apply(LogPayload::UpsertJob(job)).await
    }

    pub async fn upsert_evals(&self, evals: Vec<Evaluation>) -> Result<LogIndex, ApplyError> {
        self.apply(LogPayload::UpsertEvals(evals)).await
    }

    pub async fn upsert_allocs(&self, allocs: Vec<Allocation>) -> Result<LogIndex, ApplyError> {
        self.apply(LogPayload::UpsertAllocs(allocs)).await
    }

    pub async fn upsert_node(&self, node: Node) -> Result<LogIndex, ApplyError> {
        self.apply(LogPayload::UpsertNode(node)).await
    }

    pub async fn upsert_deployment(&self, deployment: Deployment) -> Result<LogIndex, ApplyError> {
        self.apply(LogPayload::UpsertDeployment(deployment)).await
    }

    /// The state machine side: decode, apply, witness.
    fn apply_entry(&self, bytes: &[u8]) -> Result<(), ApplyError> {
        let LogEntry { index, payload } = LogEntry::decode(bytes)?;
        match payload {
            LogPayload::UpsertJob(job) => self.store.upsert_job(index, job)?,
            LogPayload::UpsertEvals(evals) => self.store.upsert_evals(index, evals)?,
            LogPayload::UpsertAllocs(allocs) => self.store.upsert_allocs(index, allocs)?,
            LogPayload::UpsertNode(node) => self.store.upsert_node(index, node)?,
            LogPayload::UpsertDeployment(d) => self.store.upsert_deployment(index, d)?,
            LogPayload::Delete(commands) => self.store.delete(index, &commands)?,
        }
        self.time_table.witness(index, self.clock.now());
        Ok(())
    }
}

#[async_trait]
impl LogApplier for LocalLog {
    async fn apply_batch(&self, commands: Vec<DeleteCommand>) -> Result<LogIndex, ApplyError> {
        self.apply(LogPayload::Delete(commands)).await
    }

    fn last_index(&self) -> LogIndex {
        self.store.latest_index()
    }
}
