//! Cluster object definitions.
//!
//! Status enums carry their own terminal predicates; a terminal object will
//! not transition any further and is a garbage collection candidate.

use orca_id::{AllocId, DeploymentId, EvalId, JobId, LogIndex, NodeId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Object Classes
// =============================================================================

/// The classes of objects the core scheduler can reclaim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Eval,
    Alloc,
    Node,
    Job,
    Deployment,
}

impl ObjectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eval => "eval",
            Self::Alloc => "alloc",
            Self::Node => "node",
            Self::Job => "job",
            Self::Deployment => "deployment",
        }
    }
}

impl std::fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// Scheduler type of a job (and of the evaluations created for it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    #[default]
    Service,
    Batch,
    System,
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Dead,
}

impl JobStatus {
    /// A dead job has no further work to do.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dead)
    }
}

/// A user-submitted workload definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Set when the user has asked for the job to be stopped.
    pub stop: bool,
    pub modify_index: LogIndex,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// =============================================================================
// Evaluations
// =============================================================================

/// Evaluation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalStatus {
    #[default]
    Pending,
    Blocked,
    Running,
    Complete,
    Failed,
    Canceled,
}

impl EvalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Canceled)
    }
}

/// A single scheduling decision made for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: EvalId,
    pub job_id: JobId,
    pub eval_type: JobType,
    pub status: EvalStatus,
    pub modify_index: LogIndex,
}

impl Evaluation {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// =============================================================================
// Allocations
// =============================================================================

/// What the servers want the allocation to be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredStatus {
    #[default]
    Run,
    Stop,
    Evict,
    Failed,
}

impl DesiredStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stop | Self::Evict | Self::Failed)
    }
}

/// What the client reports the allocation is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    #[default]
    Pending,
    Running,
    Complete,
    Failed,
    Lost,
}

impl ClientStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Lost)
    }
}

/// A placement of part of a job onto a node.
///
/// `eval_id` and `deployment_id` are back-references: the evaluation or
/// deployment owns the allocation, not the other way round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocId,
    pub eval_id: EvalId,
    pub job_id: JobId,
    pub node_id: NodeId,
    pub deployment_id: Option<DeploymentId>,
    pub desired_status: DesiredStatus,
    pub client_status: ClientStatus,
    pub modify_index: LogIndex,
}

impl Allocation {
    /// An allocation is terminal once the servers have given up on it or the
    /// client reports it finished.
    pub fn is_terminal(&self) -> bool {
        self.desired_status.is_terminal() || self.client_status.is_terminal()
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Node liveness as seen by the servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Initializing,
    Ready,
    Down,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Down)
    }
}

/// A client machine registered with the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub status: NodeStatus,
    pub modify_index: LogIndex,
}

impl Node {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// =============================================================================
// Deployments
// =============================================================================

/// Deployment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    #[default]
    Running,
    Paused,
    Successful,
    Failed,
    Cancelled,
}

impl DeploymentStatus {
    /// Running and paused deployments are still active.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed | Self::Cancelled)
    }
}

/// A rollout of one version of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub job_id: JobId,
    pub status: DeploymentStatus,
    pub modify_index: LogIndex,
}

impl Deployment {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
