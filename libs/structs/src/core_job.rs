//! Core job descriptors.
//!
//! A core job is an internally generated housekeeping task. It is created by
//! the dispatcher, consumed exactly once by the core scheduler and never
//! persisted.

use orca_id::LogIndex;
use serde::{Deserialize, Serialize};

use crate::StructsError;

/// The housekeeping passes the core scheduler knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoreJobType {
    /// Reclaim terminal evaluations together with their allocations.
    EvalGc,
    /// Reclaim nodes that have been down past the threshold.
    NodeGc,
    /// Reclaim dead jobs together with their evaluations and allocations.
    JobGc,
    /// Reclaim finished deployments together with their allocations.
    DeploymentGc,
    /// Run every GC pass with age thresholds ignored.
    ForceGc,
}

impl CoreJobType {
    /// Types the dispatcher schedules on an interval. Force GC only runs on
    /// request.
    pub const PERIODIC: [CoreJobType; 4] = [
        CoreJobType::EvalGc,
        CoreJobType::NodeGc,
        CoreJobType::JobGc,
        CoreJobType::DeploymentGc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EvalGc => "eval-gc",
            Self::NodeGc => "node-gc",
            Self::JobGc => "job-gc",
            Self::DeploymentGc => "deployment-gc",
            Self::ForceGc => "force-gc",
        }
    }
}

impl std::fmt::Display for CoreJobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CoreJobType {
    type Err = StructsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eval-gc" => Ok(Self::EvalGc),
            "node-gc" => Ok(Self::NodeGc),
            "job-gc" => Ok(Self::JobGc),
            "deployment-gc" => Ok(Self::DeploymentGc),
            "force-gc" => Ok(Self::ForceGc),
            other => Err(StructsError::UnknownCoreJobType(other.to_string())),
        }
    }
}

/// One housekeeping task.
///
/// `modify_index` is the log index the job was created at. The scheduler
/// uses it as the time anchor of the pass and requires its state snapshot to
/// be at least that fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreJob {
    pub job_type: CoreJobType,
    pub modify_index: LogIndex,
}

impl CoreJob {
    pub fn new(job_type: CoreJobType, modify_index: LogIndex) -> Self {
        Self {
            job_type,
            modify_index,
        }
    }
}
