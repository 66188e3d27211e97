//! Read-only views over the state store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use im::{OrdMap, OrdSet};
use orca_id::{AllocId, DeploymentId, EvalId, JobId, LogIndex, NodeId};
use orca_structs::{Allocation, Deployment, Evaluation, Job, Node, ObjectClass};

use crate::StateError;

/// Something that can hand out snapshots at least as fresh as an index.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Returns a snapshot whose index is `>= index`, waiting up to `wait`
    /// for the store to catch up.
    async fn snapshot_min_index(
        &self,
        index: LogIndex,
        wait: Duration,
    ) -> Result<StateSnapshot, StateError>;
}

/// Lightweight reference to a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef {
    pub class: ObjectClass,
    pub id: orca_id::Ulid,
    pub modify_index: LogIndex,
}

/// The full set of tables and secondary indexes.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub(crate) index: LogIndex,
    pub(crate) jobs: OrdMap<JobId, Arc<Job>>,
    pub(crate) evals: OrdMap<EvalId, Arc<Evaluation>>,
    pub(crate) allocs: OrdMap<AllocId, Arc<Allocation>>,
    pub(crate) nodes: OrdMap<NodeId, Arc<Node>>,
    pub(crate) deployments: OrdMap<DeploymentId, Arc<Deployment>>,
    pub(crate) evals_by_job: OrdMap<JobId, OrdSet<EvalId>>,
    pub(crate) allocs_by_eval: OrdMap<EvalId, OrdSet<AllocId>>,
    pub(crate) allocs_by_node: OrdMap<NodeId, OrdSet<AllocId>>,
    pub(crate) allocs_by_job: OrdMap<JobId, OrdSet<AllocId>>,
    pub(crate) allocs_by_deployment: OrdMap<DeploymentId, OrdSet<AllocId>>,
}

/// Immutable point-in-time view of the state store.
///
/// All reads against one snapshot observe exactly the data as of
/// [`StateSnapshot::index`], regardless of concurrent writes to the store.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    tables: Tables,
}

impl StateSnapshot {
    pub(crate) fn new(tables: Tables) -> Self {
        Self { tables }
    }

    /// Index of the last write visible in this snapshot.
    pub fn index(&self) -> LogIndex {
        self.tables.index
    }

    pub fn job_by_id(&self, id: &JobId) -> Option<&Job> {
        self.tables.jobs.get(id).map(Arc::as_ref)
    }

    pub fn eval_by_id(&self, id: &EvalId) -> Option<&Evaluation> {
        self.tables.evals.get(id).map(Arc::as_ref)
    }

    pub fn alloc_by_id(&self, id: &AllocId) -> Option<&Allocation> {
        self.tables.allocs.get(id).map(Arc::as_ref)
    }

    pub fn node_by_id(&self, id: &NodeId) -> Option<&Node> {
        self.tables.nodes.get(id).map(Arc::as_ref)
    }

    pub fn deployment_by_id(&self, id: &DeploymentId) -> Option<&Deployment> {
        self.tables.deployments.get(id).map(Arc::as_ref)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> + '_ {
        self.tables.jobs.values().map(Arc::as_ref)
    }

    pub fn evals(&self) -> impl Iterator<Item = &Evaluation> + '_ {
        self.tables.evals.values().map(Arc::as_ref)
    }

    pub fn allocs(&self) -> impl Iterator<Item = &Allocation> + '_ {
        self.tables.allocs.values().map(Arc::as_ref)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.tables.nodes.values().map(Arc::as_ref)
    }

    pub fn deployments(&self) -> impl Iterator<Item = &Deployment> + '_ {
        self.tables.deployments.values().map(Arc::as_ref)
    }

    pub fn evals_by_job(&self, job_id: &JobId) -> Vec<&Evaluation> {
        self.tables
            .evals_by_job
            .get(job_id)
            .map(|ids| ids.iter().filter_map(|id| self.eval_by_id(id)).collect())
            .unwrap_or_default()
    }

    pub fn allocs_by_eval(&self, eval_id: &EvalId) -> Vec<&Allocation> {
        self.collect_allocs(self.tables.allocs_by_eval.get(eval_id))
    }

    pub fn allocs_by_node(&self, node_id: &NodeId) -> Vec<&Allocation> {
        self.collect_allocs(self.tables.allocs_by_node.get(node_id))
    }

    pub fn allocs_by_job(&self, job_id: &JobId) -> Vec<&Allocation> {
        self.collect_allocs(self.tables.allocs_by_job.get(job_id))
    }

    pub fn allocs_by_deployment(&self, deployment_id: &DeploymentId) -> Vec<&Allocation> {
        self.collect_allocs(self.tables.allocs_by_deployment.get(deployment_id))
    }

    /// Lists every object of `class` as a lightweight reference.
    pub fn list(&self, class: ObjectClass) -> Vec<ObjectRef> {
        let refer = |id: orca_id::Ulid, modify_index: LogIndex| ObjectRef {
            class,
            id,
            modify_index,
        };
        match class {
            ObjectClass::Job => self.jobs().map(|j| refer(j.id.ulid(), j.modify_index)).collect(),
            ObjectClass::Eval => self.evals().map(|e| refer(e.id.ulid(), e.modify_index)).collect(),
            ObjectClass::Alloc => self.allocs().map(|a| refer(a.id.ulid(), a.modify_index)).collect(),
            ObjectClass::Node => self.nodes().map(|n| refer(n.id.ulid(), n.modify_index)).collect(),
            ObjectClass::Deployment => self
                .deployments()
                .map(|d| refer(d.id.ulid(), d.modify_index))
                .collect(),
        }
    }

    fn collect_allocs(&self, ids: Option<&OrdSet<AllocId>>) -> Vec<&Allocation> {
        ids.map(|ids| ids.iter().filter_map(|id| self.alloc_by_id(id)).collect())
            .unwrap_or_default()
    }
}
