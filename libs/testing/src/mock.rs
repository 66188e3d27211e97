//! Mock cluster objects.
//!
//! Each builder returns a live (non-terminal) object with fresh IDs and a
//! zero `modify_index`; the state store stamps the real index on upsert.
//! Tests flip the status fields they care about.

use orca_id::{AllocId, DeploymentId, EvalId, JobId, LogIndex, NodeId};
use orca_structs::{
    Allocation, ClientStatus, Deployment, DeploymentStatus, DesiredStatus, EvalStatus,
    Evaluation, Job, JobStatus, JobType, Node, NodeStatus,
};

pub fn job() -> Job {
    Job {
        id: JobId::new(),
        name: "web".to_string(),
        job_type: JobType::Service,
        status: JobStatus::Running,
        stop: false,
        modify_index: LogIndex::ZERO,
    }
}

/// A dead, stopped job.
pub fn dead_job() -> Job {
    Job {
        status: JobStatus::Dead,
        stop: true,
        ..job()
    }
}

pub fn eval() -> Evaluation {
    Evaluation {
        id: EvalId::new(),
        job_id: JobId::new(),
        eval_type: JobType::Service,
        status: EvalStatus::Pending,
        modify_index: LogIndex::ZERO,
    }
}

pub fn eval_for(job: &Job) -> Evaluation {
    Evaluation {
        job_id: job.id,
        eval_type: job.job_type,
        ..eval()
    }
}

pub fn alloc() -> Allocation {
    Allocation {
        id: AllocId::new(),
        eval_id: EvalId::new(),
        job_id: JobId::new(),
        node_id: NodeId::new(),
        deployment_id: None,
        desired_status: DesiredStatus::Run,
        client_status: ClientStatus::Pending,
        modify_index: LogIndex::ZERO,
    }
}

pub fn alloc_for(eval: &Evaluation) -> Allocation {
    Allocation {
        eval_id: eval.id,
        job_id: eval.job_id,
        ..alloc()
    }
}

pub fn node() -> Node {
    Node {
        id: NodeId::new(),
        name: "client-1".to_string(),
        status: NodeStatus::Ready,
        modify_index: LogIndex::ZERO,
    }
}

pub fn deployment() -> Deployment {
    Deployment {
        id: DeploymentId::new(),
        job_id: JobId::new(),
        status: DeploymentStatus::Running,
        modify_index: LogIndex::ZERO,
    }
}

pub fn deployment_for(job: &Job) -> Deployment {
    Deployment {
        job_id: job.id,
        ..deployment()
    }
}
