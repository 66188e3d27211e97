//! Garbage collection eligibility rules.
//!
//! Every rule has the same shape: an object may be collected iff its status
//! is terminal, it is older than the class threshold, and nothing live
//! depends on it. The functions here are pure; the scheduler resolves
//! last-modified times and dependents from its snapshot and passes them in.

use std::time::Duration;

use chrono::{DateTime, Utc};
use orca_structs::{Allocation, Deployment, Evaluation, Job, JobType, Node};
use orca_timetable::to_delta;

/// Outcome of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Collect,
    Keep(KeepReason),
}

impl Decision {
    pub fn is_collect(&self) -> bool {
        matches!(self, Decision::Collect)
    }
}

/// Why an object survives a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    NotTerminal,
    TooRecent,
    /// A dependent object is still live.
    LiveDependent,
    /// Batch evaluations are kept while their job is still around.
    BatchJobAlive,
}

/// Age gate for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeCheck {
    now: DateTime<Utc>,
    threshold: chrono::Duration,
    forced: bool,
}

impl AgeCheck {
    pub fn new(now: DateTime<Utc>, threshold: Duration) -> Self {
        Self {
            now,
            threshold: to_delta(threshold),
            forced: false,
        }
    }

    /// An age gate every object passes.
    pub fn forced(now: DateTime<Utc>) -> Self {
        Self {
            now,
            threshold: chrono::Duration::zero(),
            forced: true,
        }
    }

    /// Whether an object last modified at `modified_at` is strictly older
    /// than the threshold. An unknown modification time never is.
    pub fn exceeded(&self, modified_at: Option<DateTime<Utc>>) -> bool {
        if self.forced {
            return true;
        }
        match modified_at {
            Some(modified_at) => self.now.signed_duration_since(modified_at) > self.threshold,
            None => false,
        }
    }
}

fn all_terminal(allocs: &[&Allocation]) -> bool {
    allocs.iter().all(|a| a.is_terminal())
}

/// Evaluation rule. `allocs` are the evaluation's allocations and `job` its
/// job if it still exists. Allocations of a collected evaluation are
/// collected with it regardless of their own age.
pub fn eval(
    eval: &Evaluation,
    modified_at: Option<DateTime<Utc>>,
    allocs: &[&Allocation],
    job: Option<&Job>,
    age: &AgeCheck,
    allow_batch: bool,
) -> Decision {
    if !eval.is_terminal() {
        return Decision::Keep(KeepReason::NotTerminal);
    }
    if !age.exceeded(modified_at) {
        return Decision::Keep(KeepReason::TooRecent);
    }
    if !all_terminal(allocs) {
        return Decision::Keep(KeepReason::LiveDependent);
    }
    if eval.eval_type == JobType::Batch && !allow_batch {
        let job_gone = job.is_none_or(|j| j.stop && j.is_terminal());
        if !job_gone {
            return Decision::Keep(KeepReason::BatchJobAlive);
        }
    }
    Decision::Collect
}

/// Node rule. `allocs` are the allocations placed on the node; any live one
/// pins the node regardless of how long it has been down.
pub fn node(
    node: &Node,
    modified_at: Option<DateTime<Utc>>,
    allocs: &[&Allocation],
    age: &AgeCheck,
) -> Decision {
    if !node.is_terminal() {
        return Decision::Keep(KeepReason::NotTerminal);
    }
    if !age.exceeded(modified_at) {
        return Decision::Keep(KeepReason::TooRecent);
    }
    if !all_terminal(allocs) {
        return Decision::Keep(KeepReason::LiveDependent);
    }
    Decision::Collect
}

/// Job rule. `evals` are the decisions already made for each of the job's
/// evaluations and `allocs` every allocation of the job.
pub fn job(
    job: &Job,
    modified_at: Option<DateTime<Utc>>,
    evals: &[Decision],
    allocs: &[&Allocation],
    age: &AgeCheck,
) -> Decision {
    if !job.is_terminal() {
        return Decision::Keep(KeepReason::NotTerminal);
    }
    if !age.exceeded(modified_at) {
        return Decision::Keep(KeepReason::TooRecent);
    }
    if !evals.iter().all(Decision::is_collect) || !all_terminal(allocs) {
        return Decision::Keep(KeepReason::LiveDependent);
    }
    Decision::Collect
}

/// Deployment rule. `allocs` are the allocations created by the deployment
/// and `evals` the decisions for the evaluations that produced them; an
/// evaluation that no longer exists counts as `Collect`. Allocations are
/// only cascaded when every one of their evaluations allows it.
pub fn deployment(
    deployment: &Deployment,
    modified_at: Option<DateTime<Utc>>,
    evals: &[Decision],
    allocs: &[&Allocation],
    age: &AgeCheck,
) -> Decision {
    if !deployment.is_terminal() {
        return Decision::Keep(KeepReason::NotTerminal);
    }
    if !age.exceeded(modified_at) {
        return Decision::Keep(KeepReason::TooRecent);
    }
    if !all_terminal(allocs) || !evals.iter().all(Decision::is_collect) {
        return Decision::Keep(KeepReason::LiveDependent);
    }
    Decision::Collect
}
