//! The live state store.
//!
//! Writes arrive from the log apply path, each stamped with the log index of
//! the entry being applied. Reads either go through point lookups or through
//! a [`StateSnapshot`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use im::{OrdMap, OrdSet};
use orca_id::{AllocId, DeploymentId, EvalId, JobId, LogIndex, NodeId};
use orca_structs::{Allocation, DeleteCommand, Deployment, Evaluation, Job, Node};
use tokio::sync::watch;
use tracing::debug;

use crate::snapshot::Tables;
use crate::{SnapshotSource, StateError, StateSnapshot};

/// In-memory cluster state store.
pub struct StateStore {
    tables: RwLock<Tables>,
    index_tx: watch::Sender<LogIndex>,
    closed: AtomicBool,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (index_tx, _) = watch::channel(LogIndex::ZERO);
        Self {
            tables: RwLock::new(Tables::default()),
            index_tx,
            closed: AtomicBool::new(false),
        }
    }

    /// Index of the latest applied write.
    pub fn latest_index(&self) -> LogIndex {
        *self.index_tx.borrow()
    }

    /// Current view of the store.
    pub fn snapshot(&self) -> Result<StateSnapshot, StateError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StateError::Closed);
        }
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(StateSnapshot::new(tables.clone()))
    }

    /// Rejects further snapshots and writes.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn upsert_job(&self, index: LogIndex, job: Job) -> Result<(), StateError> {
        self.write(index, |tables| {
            let mut job = job;
            job.modify_index = index;
            tables.jobs.insert(job.id, Arc::new(job));
        })
    }

    pub fn upsert_evals(&self, index: LogIndex, evals: Vec<Evaluation>) -> Result<(), StateError> {
        self.write(index, |tables| {
            for mut eval in evals {
                eval.modify_index = index;
                if let Some(prev) = tables.evals.get(&eval.id).cloned() {
                    index_remove(&mut tables.evals_by_job, prev.job_id, &prev.id);
                }
                index_insert(&mut tables.evals_by_job, eval.job_id, eval.id);
                tables.evals.insert(eval.id, Arc::new(eval));
            }
        })
    }

    pub fn upsert_allocs(
        &self,
        index: LogIndex,
        allocs: Vec<Allocation>,
    ) -> Result<(), StateError> {
        self.write(index, |tables| {
            for mut alloc in allocs {
                alloc.modify_index = index;
                if let Some(prev) = tables.allocs.get(&alloc.id).cloned() {
                    unindex_alloc(tables, &prev);
                }
                index_insert(&mut tables.allocs_by_eval, alloc.eval_id, alloc.id);
                index_insert(&mut tables.allocs_by_node, alloc.node_id, alloc.id);
                index_insert(&mut tables.allocs_by_job, alloc.job_id, alloc.id);
                if let Some(deployment_id) = alloc.deployment_id {
                    index_insert(&mut tables.allocs_by_deployment, deployment_id, alloc.id);
                }
                tables.allocs.insert(alloc.id, Arc::new(alloc));
            }
        })
    }

    pub fn upsert_node(&self, index: LogIndex, node: Node) -> Result<(), StateError> {
        self.write(index, |tables| {
            let mut node = node;
            node.modify_index = index;
            tables.nodes.insert(node.id, Arc::new(node));
        })
    }

    pub fn upsert_deployment(
        &self,
        index: LogIndex,
        deployment: Deployment,
    ) -> Result<(), StateError> {
        self.write(index, |tables| {
            let mut deployment = deployment;
            deployment.modify_index = index;
            tables.deployments.insert(deployment.id, Arc::new(deployment));
        })
    }

    /// Applies deletions in order. Missing objects are skipped.
    pub fn delete(&self, index: LogIndex, commands: &[DeleteCommand]) -> Result<(), StateError> {
        self.write(index, |tables| {
            for command in commands {
                match command {
                    DeleteCommand::Alloc(id) => {
                        if let Some(prev) = tables.allocs.remove(id) {
                            unindex_alloc(tables, &prev);
                        }
                    }
                    DeleteCommand::Eval(id) => {
                        if let Some(prev) = tables.evals.remove(id) {
                            index_remove(&mut tables.evals_by_job, prev.job_id, id);
                        }
                    }
                    DeleteCommand::Node(id) => {
                        tables.nodes.remove(id);
                    }
                    DeleteCommand::Job(id) => {
                        tables.jobs.remove(id);
                    }
                    DeleteCommand::Deployment(id) => {
                        tables.deployments.remove(id);
                    }
                }
            }
            debug!(%index, deleted = commands.len(), "Applied deletions");
        })
    }

    pub fn job_by_id(&self, id: &JobId) -> Option<Job> {
        self.read(|t| t.jobs.get(id).map(|j| j.as_ref().clone()))
    }

    pub fn eval_by_id(&self, id: &EvalId) -> Option<Evaluation> {
        self.read(|t| t.evals.get(id).map(|e| e.as_ref().clone()))
    }

    pub fn alloc_by_id(&self, id: &AllocId) -> Option<Allocation> {
        self.read(|t| t.allocs.get(id).map(|a| a.as_ref().clone()))
    }

    pub fn node_by_id(&self, id: &NodeId) -> Option<Node> {
        self.read(|t| t.nodes.get(id).map(|n| n.as_ref().clone()))
    }

    pub fn deployment_by_id(&self, id: &DeploymentId) -> Option<Deployment> {
        self.read(|t| t.deployments.get(id).map(|d| d.as_ref().clone()))
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        f(&tables)
    }

    fn write(&self, index: LogIndex, f: impl FnOnce(&mut Tables)) -> Result<(), StateError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StateError::Closed);
        }

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if index < tables.index {
            return Err(StateError::IndexRegression {
                index,
                latest: tables.index,
            });
        }

        f(&mut tables);
        tables.index = index;
        drop(tables);

        self.index_tx.send_replace(index);
        Ok(())
    }
}

#[async_trait]
impl SnapshotSource for StateStore {
    async fn snapshot_min_index(
        &self,
        index: LogIndex,
        wait: Duration,
    ) -> Result<StateSnapshot, StateError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StateError::Closed);
        }

        let mut rx = self.index_tx.subscribe();
        let reached = tokio::time::timeout(wait, async {
            rx.wait_for(|latest| *latest >= index).await.map(|_| ())
        })
        .await;

        match reached {
            Ok(Ok(())) => self.snapshot(),
            Ok(Err(_)) => Err(StateError::Closed),
            Err(_) => Err(StateError::SnapshotUnavailable {
                requested: index,
                latest: self.latest_index(),
            }),
        }
    }
}

fn index_insert<K, V>(index: &mut OrdMap<K, OrdSet<V>>, key: K, value: V)
where
    K: Ord + Clone,
    V: Ord + Clone,
{
    let mut set = index.get(&key).cloned().unwrap_or_default();
    set.insert(value);
    index.insert(key, set);
}

fn index_remove<K, V>(index: &mut OrdMap<K, OrdSet<V>>, key: K, value: &V)
where
    K: Ord + Clone,
    V: Ord + Clone,
{
    let Some(mut set) = index.get(&key).cloned() else {
        return;
    };
    set.remove(value);
    if set.is_empty() {
        index.remove(&key);
    } else {
        index.insert(key, set);
    }
}

fn unindex_alloc(tables: &mut Tables, alloc: &Allocation) {
    index_remove(&mut tables.allocs_by_eval, alloc.eval_id, &alloc.id);
    index_remove(&mut tables.allocs_by_node, alloc.node_id, &alloc.id);
    index_remove(&mut tables.allocs_by_job, alloc.job_id, &alloc.id);
    if let Some(deployment_id) = alloc.deployment_id {
        index_remove(&mut tables.allocs_by_deployment, deployment_id, &alloc.id);
    }
}
