//! One garbage collection pass.
//!
//! See the module docs in `core_sched` for the overall flow.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use orca_id::{AllocId, EvalId, LogIndex};
use orca_state::StateSnapshot;
use orca_structs::{
    Allocation, CoreJob, CoreJobType, DeleteCommand, Evaluation, GcBatch, ObjectClass,
};
use tracing::{debug, info, instrument, trace, warn};

use super::eligibility::{self, AgeCheck, Decision};
use super::{CoreSchedError, CoreSchedResult, CoreServices};

/// The deletions a pass decided on, before anything is submitted.
#[derive(Debug, Clone)]
pub struct GcPlan {
    pub job: CoreJob,
    /// Reference time the object ages were measured against.
    pub now: DateTime<Utc>,
    /// Index of the snapshot the decisions were made on.
    pub snapshot_index: LogIndex,
    /// Deletions, dependents ahead of the objects that own them.
    pub batch: GcBatch,
}

/// Outcome of a submitted pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub job: CoreJob,
    pub snapshot_index: LogIndex,
    /// Objects deleted per class.
    pub collected: BTreeMap<ObjectClass, usize>,
    pub batches_submitted: usize,
    /// Log index of the last submitted batch.
    pub applied_index: Option<LogIndex>,
}

impl PassReport {
    pub fn collected(&self, class: ObjectClass) -> usize {
        self.collected.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.collected.values().sum()
    }
}

/// Runs garbage collection passes against one snapshot.
pub struct CoreScheduler {
    services: CoreServices,
    snapshot: StateSnapshot,
}

impl CoreScheduler {
    pub fn new(services: CoreServices, snapshot: StateSnapshot) -> Self {
        Self { services, snapshot }
    }

    /// The snapshot decisions are currently made against.
    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    /// Runs one pass for `job` and submits its deletions.
    ///
    /// Batches are submitted in order; the first failure aborts the pass.
    /// Batches already applied stay applied, the rest are left for the next
    /// pass to rediscover.
    #[instrument(skip(self), fields(job_type = %job.job_type, job_index = %job.modify_index))]
    pub async fn process(&mut self, job: &CoreJob) -> CoreSchedResult<PassReport> {
        let plan = self.plan(job).await?;
        let mut report = PassReport {
            job: *job,
            snapshot_index: plan.snapshot_index,
            collected: BTreeMap::new(),
            batches_submitted: 0,
            applied_index: None,
        };

        if plan.batch.is_empty() {
            debug!(snapshot_index = %plan.snapshot_index, "Nothing to collect");
            return Ok(report);
        }

        debug!(planned = ?plan.batch.counts(), "Submitting deletions");
        let apply_timeout = self.services.config.apply_timeout;
        for partition in plan.batch.partition(self.services.config.max_ids_per_batch) {
            if self.services.shutdown_requested() {
                warn!(
                    batches_submitted = report.batches_submitted,
                    "Shutdown requested, abandoning pass"
                );
                return Err(CoreSchedError::Shutdown);
            }

            let classes: Vec<ObjectClass> = partition.iter().map(DeleteCommand::class).collect();
            let index =
                tokio::time::timeout(apply_timeout, self.services.log.apply_batch(partition))
                    .await
                    .map_err(|_| CoreSchedError::ApplyTimeout(apply_timeout))??;

            for class in classes {
                *report.collected.entry(class).or_insert(0) += 1;
            }
            report.batches_submitted += 1;
            report.applied_index = Some(index);
        }

        info!(
            allocs = report.collected(ObjectClass::Alloc),
            evals = report.collected(ObjectClass::Eval),
            jobs = report.collected(ObjectClass::Job),
            deployments = report.collected(ObjectClass::Deployment),
            nodes = report.collected(ObjectClass::Node),
            batches = report.batches_submitted,
            "Core GC pass complete"
        );

        Ok(report)
    }

    /// Decides what `job` would delete without submitting anything.
    pub async fn plan(&mut self, job: &CoreJob) -> CoreSchedResult<GcPlan> {
        self.ensure_snapshot(job).await?;
        let now = self.resolve_now(job);
        let gc = &self.services.config;

        let batch = match job.job_type {
            CoreJobType::EvalGc => self.eval_gc(&AgeCheck::new(now, gc.eval_gc_threshold)),
            CoreJobType::NodeGc => self.node_gc(&AgeCheck::new(now, gc.node_gc_threshold)),
            CoreJobType::JobGc => self.job_gc(&AgeCheck::new(now, gc.job_gc_threshold)),
            CoreJobType::DeploymentGc => {
                self.deployment_gc(&AgeCheck::new(now, gc.deployment_gc_threshold))
            }
            CoreJobType::ForceGc => self.force_gc(now),
        };

        Ok(GcPlan {
            job: *job,
            now,
            snapshot_index: self.snapshot.index(),
            batch,
        })
    }

    /// Replaces the snapshot if it predates the job. The job's index is
    /// capped at what the log has committed: a snapshot cannot be required to
    /// contain entries this member has never seen.
    async fn ensure_snapshot(&mut self, job: &CoreJob) -> CoreSchedResult<()> {
        let required = job.modify_index.min(self.services.log.last_index());
        if self.snapshot.index() >= required {
            return Ok(());
        }

        debug!(
            snapshot_index = %self.snapshot.index(),
            %required,
            "Snapshot predates core job, acquiring a fresh one"
        );
        self.snapshot = self
            .services
            .state
            .snapshot_min_index(required, self.services.config.snapshot_wait)
            .await?;
        Ok(())
    }

    /// The local clock, moved forward to the job's anchor time if the clock
    /// lags what the log has witnessed.
    fn resolve_now(&self, job: &CoreJob) -> DateTime<Utc> {
        let local = self.services.clock.now();
        let table = &self.services.time_table;
        if table.is_empty() {
            warn!(
                job_type = %job.job_type,
                "Time table is empty, no object has a known age this pass"
            );
            return local;
        }
        local.max(table.nearest_time(job.modify_index))
    }

    /// Latest time the write at `index` can have happened.
    fn modified_at(&self, index: LogIndex) -> Option<DateTime<Utc>> {
        self.services.time_table.time_upper_bound(index)
    }

    fn eval_gc(&self, age: &AgeCheck) -> GcBatch {
        let mut allocs = Vec::new();
        let mut evals = Vec::new();

        for eval in self.snapshot.evals() {
            if let Some(eval_allocs) = self.collectable_eval(eval, age) {
                allocs.extend(eval_allocs.into_iter().map(DeleteCommand::Alloc));
                evals.push(DeleteCommand::Eval(eval.id));
            }
        }

        debug!(evals = evals.len(), allocs = allocs.len(), "Eval GC candidates");
        allocs.into_iter().chain(evals).collect()
    }

    /// Allocations to cascade if `eval` can be collected.
    fn collectable_eval(&self, eval: &Evaluation, age: &AgeCheck) -> Option<Vec<AllocId>> {
        match self.eval_decision(eval, age) {
            Decision::Collect => Some(
                self.snapshot
                    .allocs_by_eval(&eval.id)
                    .iter()
                    .map(|a| a.id)
                    .collect(),
            ),
            Decision::Keep(reason) => {
                trace!(eval_id = %eval.id, ?reason, "Keeping evaluation");
                None
            }
        }
    }

    fn node_gc(&self, age: &AgeCheck) -> GcBatch {
        let mut nodes = GcBatch::new();

        for node in self.snapshot.nodes() {
            let allocs = self.snapshot.allocs_by_node(&node.id);
            let modified_at = self.modified_at(node.modify_index);
            match eligibility::node(node, modified_at, &allocs, age) {
                Decision::Collect => {
                    nodes.push(DeleteCommand::Node(node.id));
                }
                Decision::Keep(reason) => {
                    trace!(node_id = %node.id, ?reason, "Keeping node");
                }
            }
        }

        debug!(nodes = nodes.len(), "Node GC candidates");
        nodes
    }

    fn job_gc(&self, age: &AgeCheck) -> GcBatch {
        let mut allocs = Vec::new();
        let mut evals = Vec::new();
        let mut jobs = Vec::new();

        for job in self.snapshot.jobs() {
            let job_evals = self.snapshot.evals_by_job(&job.id);
            let decisions: Vec<Decision> = job_evals
                .iter()
                .map(|eval| {
                    let eval_allocs = self.snapshot.allocs_by_eval(&eval.id);
                    let modified_at = self.modified_at(eval.modify_index);
                    eligibility::eval(eval, modified_at, &eval_allocs, Some(job), age, true)
                })
                .collect();
            let job_allocs = self.snapshot.allocs_by_job(&job.id);
            let modified_at = self.modified_at(job.modify_index);

            match eligibility::job(job, modified_at, &decisions, &job_allocs, age) {
                Decision::Collect => {
                    allocs.extend(job_allocs.iter().map(|a| DeleteCommand::Alloc(a.id)));
                    evals.extend(job_evals.iter().map(|e| DeleteCommand::Eval(e.id)));
                    jobs.push(DeleteCommand::Job(job.id));
                }
                Decision::Keep(reason) => {
                    trace!(job_id = %job.id, ?reason, "Keeping job");
                }
            }
        }

        debug!(
            jobs = jobs.len(),
            evals = evals.len(),
            allocs = allocs.len(),
            "Job GC candidates"
        );
        allocs.into_iter().chain(evals).chain(jobs).collect()
    }

    fn deployment_gc(&self, age: &AgeCheck) -> GcBatch {
        let mut allocs = Vec::new();
        let mut deployments = Vec::new();

        for deployment in self.snapshot.deployments() {
            let deployment_allocs = self.snapshot.allocs_by_deployment(&deployment.id);
            let decisions = self.alloc_eval_decisions(&deployment_allocs, age);
            let modified_at = self.modified_at(deployment.modify_index);
            match eligibility::deployment(
                deployment,
                modified_at,
                &decisions,
                &deployment_allocs,
                age,
            ) {
                Decision::Collect => {
                    allocs.extend(deployment_allocs.iter().map(|a| DeleteCommand::Alloc(a.id)));
                    deployments.push(DeleteCommand::Deployment(deployment.id));
                }
                Decision::Keep(reason) => {
                    trace!(deployment_id = %deployment.id, ?reason, "Keeping deployment");
                }
            }
        }

        debug!(
            deployments = deployments.len(),
            allocs = allocs.len(),
            "Deployment GC candidates"
        );
        allocs.into_iter().chain(deployments).collect()
    }

    /// Eval GC decisions for the evaluations behind `allocs`, one per
    /// distinct evaluation still in the snapshot.
    fn alloc_eval_decisions(&self, allocs: &[&Allocation], age: &AgeCheck) -> Vec<Decision> {
        let eval_ids: BTreeSet<EvalId> = allocs.iter().map(|a| a.eval_id).collect();
        eval_ids
            .iter()
            .filter_map(|id| self.snapshot.eval_by_id(id))
            .map(|eval| self.eval_decision(eval, age))
            .collect()
    }

    fn eval_decision(&self, eval: &Evaluation, age: &AgeCheck) -> Decision {
        let allocs = self.snapshot.allocs_by_eval(&eval.id);
        let job = self.snapshot.job_by_id(&eval.job_id);
        let modified_at = self.modified_at(eval.modify_index);
        eligibility::eval(eval, modified_at, &allocs, job, age, false)
    }

    /// Every routine with age ignored. Jobs go first so their evaluations
    /// are claimed with them; later routines skip anything already claimed.
    fn force_gc(&self, now: DateTime<Utc>) -> GcBatch {
        let age = AgeCheck::forced(now);
        let mut batch = self.job_gc(&age);
        batch.append(self.eval_gc(&age));
        batch.append(self.deployment_gc(&age));
        batch.append(self.node_gc(&age));
        batch
    }
}
