//! Integration tests for garbage collection passes.
//!
//! Objects are written through the in-process log so every write is
//! witnessed in the time table, then the manual clock is moved forward to
//! age them. The two end-to-end scenarios write straight to the store at
//! fixed indexes and witness a single anchor point instead.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orca_id::LogIndex;
use orca_server::config::GcConfig;
use orca_server::core_sched::{CoreSchedError, CoreScheduler, CoreServices, PassReport};
use orca_server::log::{ApplyError, LocalLog, LogApplier};
use orca_state::{StateError, StateStore};
use orca_structs::{
    Allocation, ClientStatus, CoreJob, CoreJobType, DeleteCommand, Deployment, DeploymentStatus,
    DesiredStatus, EvalStatus, Evaluation, Job, JobType, Node, NodeStatus, ObjectClass,
};
use orca_testing::mock;
use orca_timetable::{Clock, ManualClock, TimeTable, TimeTableConfig};
use tokio::sync::watch;

const HOUR: Duration = Duration::from_secs(3600);

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

struct Harness {
    store: Arc<StateStore>,
    time_table: Arc<TimeTable>,
    clock: Arc<ManualClock>,
    log: Arc<LocalLog>,
    config: GcConfig,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    fn with_config(config: GcConfig) -> Self {
        let store = Arc::new(StateStore::new());
        let time_table = Arc::new(TimeTable::new(TimeTableConfig {
            granularity: Duration::from_secs(1),
            limit: 96 * HOUR,
        }));
        let clock = Arc::new(ManualClock::new(start()));
        let log = Arc::new(LocalLog::new(
            store.clone(),
            time_table.clone(),
            clock.clone(),
        ));
        Self {
            store,
            time_table,
            clock,
            log,
            config,
        }
    }

    fn services(&self) -> CoreServices {
        self.services_with_log(self.log.clone())
    }

    fn services_with_log(&self, log: Arc<dyn LogApplier>) -> CoreServices {
        CoreServices::new(
            self.config.clone(),
            self.time_table.clone(),
            log,
            self.store.clone(),
            self.clock.clone(),
        )
    }

    fn scheduler(&self) -> CoreScheduler {
        CoreScheduler::new(self.services(), self.store.snapshot().unwrap())
    }

    fn job(&self, job_type: CoreJobType) -> CoreJob {
        CoreJob::new(job_type, self.log.last_index())
    }

    async fn run(&self, job_type: CoreJobType) -> Result<PassReport, CoreSchedError> {
        self.scheduler().process(&self.job(job_type)).await
    }

    /// Each write lands a second after the previous one so every write gets
    /// its own witness point.
    fn settle(&self) {
        self.clock.advance(Duration::from_secs(1));
    }

    async fn put_job(&self, job: &Job) {
        self.log.upsert_job(job.clone()).await.unwrap();
        self.settle();
    }

    async fn put_evals(&self, evals: &[&Evaluation]) {
        let evals = evals.iter().map(|e| (*e).clone()).collect();
        self.log.upsert_evals(evals).await.unwrap();
        self.settle();
    }

    async fn put_allocs(&self, allocs: &[&Allocation]) {
        let allocs = allocs.iter().map(|a| (*a).clone()).collect();
        self.log.upsert_allocs(allocs).await.unwrap();
        self.settle();
    }

    async fn put_node(&self, node: &Node) {
        self.log.upsert_node(node.clone()).await.unwrap();
        self.settle();
    }

    async fn put_deployment(&self, deployment: &Deployment) {
        self.log.upsert_deployment(deployment.clone()).await.unwrap();
        self.settle();
    }

    fn age(&self, by: Duration) {
        self.clock.advance(by);
    }
}

fn failed_eval() -> Evaluation {
    Evaluation {
        status: EvalStatus::Failed,
        ..mock::eval()
    }
}

fn stopped_alloc(eval: &Evaluation) -> Allocation {
    Allocation {
        desired_status: DesiredStatus::Stop,
        client_status: ClientStatus::Complete,
        ..mock::alloc_for(eval)
    }
}

fn running_alloc(eval: &Evaluation) -> Allocation {
    Allocation {
        client_status: ClientStatus::Running,
        ..mock::alloc_for(eval)
    }
}

fn down_node() -> Node {
    Node {
        status: NodeStatus::Down,
        ..mock::node()
    }
}

/// Log that refuses every submission.
struct RejectingLog {
    store: Arc<StateStore>,
}

#[async_trait]
impl LogApplier for RejectingLog {
    async fn apply_batch(&self, _commands: Vec<DeleteCommand>) -> Result<LogIndex, ApplyError> {
        Err(ApplyError::NotLeader)
    }

    fn last_index(&self) -> LogIndex {
        self.store.latest_index()
    }
}

/// Log that never commits.
struct StalledLog;

#[async_trait]
impl LogApplier for StalledLog {
    async fn apply_batch(&self, _commands: Vec<DeleteCommand>) -> Result<LogIndex, ApplyError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ApplyError::Timeout)
    }

    fn last_index(&self) -> LogIndex {
        LogIndex::ZERO
    }
}

/// Log that claims entries this member's store has not applied yet.
struct AheadLog {
    last: LogIndex,
}

#[async_trait]
impl LogApplier for AheadLog {
    async fn apply_batch(&self, _commands: Vec<DeleteCommand>) -> Result<LogIndex, ApplyError> {
        Ok(self.last)
    }

    fn last_index(&self) -> LogIndex {
        self.last
    }
}

/// Log that records submissions without applying them.
struct RecordingLog {
    store: Arc<StateStore>,
    batches: Mutex<Vec<Vec<DeleteCommand>>>,
}

impl RecordingLog {
    fn new(store: Arc<StateStore>) -> Self {
        Self {
            store,
            batches: Mutex::new(Vec::new()),
        }
    }

    fn take(&self) -> Vec<Vec<DeleteCommand>> {
        std::mem::take(&mut *self.batches.lock().unwrap())
    }
}

#[async_trait]
impl LogApplier for RecordingLog {
    async fn apply_batch(&self, commands: Vec<DeleteCommand>) -> Result<LogIndex, ApplyError> {
        self.batches.lock().unwrap().push(commands);
        Ok(self.store.latest_index())
    }

    fn last_index(&self) -> LogIndex {
        self.store.latest_index()
    }
}

fn successful_deployment(job: &Job) -> Deployment {
    Deployment {
        status: DeploymentStatus::Successful,
        ..mock::deployment_for(job)
    }
}

fn deployment_alloc(deployment: &Deployment, eval: &Evaluation) -> Allocation {
    Allocation {
        deployment_id: Some(deployment.id),
        ..stopped_alloc(eval)
    }
}

#[tokio::test]
async fn test_eval_gc_end_to_end() {
    let h = Harness::new();
    let eval = failed_eval();
    let alloc = Allocation {
        desired_status: DesiredStatus::Failed,
        ..mock::alloc_for(&eval)
    };
    h.store
        .upsert_evals(LogIndex::new(1000), vec![eval.clone()])
        .unwrap();
    h.store
        .upsert_allocs(LogIndex::new(1001), vec![alloc.clone()])
        .unwrap();
    let anchor = h.clock.now() - chrono::Duration::from_std(h.config.eval_gc_threshold).unwrap();
    assert!(h.time_table.witness(LogIndex::new(2000), anchor));

    // The pass runs a moment after the anchor was witnessed.
    h.age(Duration::from_secs(1));
    let job = CoreJob::new(CoreJobType::EvalGc, LogIndex::new(2000));
    let report = h.scheduler().process(&job).await.unwrap();

    assert_eq!(report.collected(ObjectClass::Eval), 1);
    assert_eq!(report.collected(ObjectClass::Alloc), 1);
    assert!(h.store.eval_by_id(&eval.id).is_none());
    assert!(h.store.alloc_by_id(&alloc.id).is_none());
}

#[tokio::test]
async fn test_node_gc_end_to_end() {
    let h = Harness::new();
    let node = down_node();
    h.store
        .upsert_node(LogIndex::new(1000), node.clone())
        .unwrap();
    let anchor = h.clock.now() - chrono::Duration::from_std(h.config.node_gc_threshold).unwrap();
    h.time_table.witness(LogIndex::new(2000), anchor);

    h.age(Duration::from_secs(1));
    let job = CoreJob::new(CoreJobType::NodeGc, LogIndex::new(2000));
    let report = h.scheduler().process(&job).await.unwrap();

    assert_eq!(report.collected(ObjectClass::Node), 1);
    assert!(h.store.node_by_id(&node.id).is_none());
}

#[tokio::test]
async fn test_eval_kept_while_alloc_is_live() {
    let h = Harness::new();
    let eval = failed_eval();
    let live = running_alloc(&eval);
    h.put_evals(&[&eval]).await;
    h.put_allocs(&[&live]).await;
    h.age(2 * HOUR);

    let report = h.run(CoreJobType::EvalGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert_eq!(report.batches_submitted, 0);
    assert!(h.store.eval_by_id(&eval.id).is_some());
    assert!(h.store.alloc_by_id(&live.id).is_some());
}

#[tokio::test]
async fn test_eval_gc_deletes_allocs_before_their_eval() {
    let h = Harness::new();
    let eval = failed_eval();
    let first = stopped_alloc(&eval);
    let second = stopped_alloc(&eval);
    h.put_evals(&[&eval]).await;
    h.put_allocs(&[&first, &second]).await;
    h.age(2 * HOUR);

    let plan = h.scheduler().plan(&h.job(CoreJobType::EvalGc)).await.unwrap();
    let commands = plan.batch.commands();

    assert_eq!(commands.len(), 3);
    assert!(commands[..2]
        .iter()
        .all(|c| c.class() == ObjectClass::Alloc));
    assert_eq!(commands[2], DeleteCommand::Eval(eval.id));
}

#[tokio::test]
async fn test_recent_eval_is_kept() {
    let h = Harness::new();
    let eval = failed_eval();
    h.put_evals(&[&eval]).await;
    h.age(Duration::from_secs(30 * 60));

    let report = h.run(CoreJobType::EvalGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.eval_by_id(&eval.id).is_some());
}

#[tokio::test]
async fn test_batch_eval_kept_while_job_is_alive() {
    let h = Harness::new();
    let job = Job {
        job_type: JobType::Batch,
        ..mock::job()
    };
    let eval = Evaluation {
        status: EvalStatus::Complete,
        ..mock::eval_for(&job)
    };
    h.put_job(&job).await;
    h.put_evals(&[&eval]).await;
    h.age(2 * HOUR);

    let report = h.run(CoreJobType::EvalGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.eval_by_id(&eval.id).is_some());
}

#[tokio::test]
async fn test_node_kept_while_alloc_is_live() {
    let h = Harness::new();
    let node = down_node();
    let alloc = Allocation {
        node_id: node.id,
        client_status: ClientStatus::Running,
        ..mock::alloc()
    };
    h.put_node(&node).await;
    h.put_allocs(&[&alloc]).await;
    h.age(48 * HOUR);

    let report = h.run(CoreJobType::NodeGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.node_by_id(&node.id).is_some());
}

#[tokio::test]
async fn test_ready_node_is_kept() {
    let h = Harness::new();
    let node = mock::node();
    h.put_node(&node).await;
    h.age(48 * HOUR);

    let report = h.run(CoreJobType::NodeGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.node_by_id(&node.id).is_some());
}

#[tokio::test]
async fn test_job_gc_cascades_in_order() {
    let h = Harness::new();
    let job = mock::dead_job();
    let eval = Evaluation {
        status: EvalStatus::Complete,
        ..mock::eval_for(&job)
    };
    let alloc = stopped_alloc(&eval);
    h.put_job(&job).await;
    h.put_evals(&[&eval]).await;
    h.put_allocs(&[&alloc]).await;
    h.age(5 * HOUR);

    let plan = h.scheduler().plan(&h.job(CoreJobType::JobGc)).await.unwrap();
    assert_eq!(
        plan.batch.commands(),
        &[
            DeleteCommand::Alloc(alloc.id),
            DeleteCommand::Eval(eval.id),
            DeleteCommand::Job(job.id),
        ]
    );

    let report = h.run(CoreJobType::JobGc).await.unwrap();
    assert_eq!(report.total(), 3);
    assert!(h.store.job_by_id(&job.id).is_none());
    assert!(h.store.eval_by_id(&eval.id).is_none());
    assert!(h.store.alloc_by_id(&alloc.id).is_none());
}

#[tokio::test]
async fn test_job_kept_while_an_eval_is_recent() {
    let h = Harness::new();
    let job = mock::dead_job();
    h.put_job(&job).await;
    h.age(5 * HOUR);

    let eval = Evaluation {
        status: EvalStatus::Complete,
        ..mock::eval_for(&job)
    };
    h.put_evals(&[&eval]).await;

    let report = h.run(CoreJobType::JobGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.job_by_id(&job.id).is_some());
    assert!(h.store.eval_by_id(&eval.id).is_some());
}

#[tokio::test]
async fn test_running_job_is_kept() {
    let h = Harness::new();
    let job = mock::job();
    h.put_job(&job).await;
    h.age(5 * HOUR);

    let report = h.run(CoreJobType::JobGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.job_by_id(&job.id).is_some());
}

#[tokio::test]
async fn test_deployment_gc_collects_with_allocs() {
    let h = Harness::new();
    let job = mock::job();
    let deployment = Deployment {
        status: DeploymentStatus::Successful,
        ..mock::deployment_for(&job)
    };
    let alloc = Allocation {
        deployment_id: Some(deployment.id),
        ..stopped_alloc(&mock::eval_for(&job))
    };
    h.put_deployment(&deployment).await;
    h.put_allocs(&[&alloc]).await;
    h.age(2 * HOUR);

    let report = h.run(CoreJobType::DeploymentGc).await.unwrap();

    assert_eq!(report.collected(ObjectClass::Deployment), 1);
    assert_eq!(report.collected(ObjectClass::Alloc), 1);
    assert!(h.store.deployment_by_id(&deployment.id).is_none());
    assert!(h.store.alloc_by_id(&alloc.id).is_none());
}

#[tokio::test]
async fn test_deployment_kept_while_alloc_eval_is_pending() {
    let h = Harness::new();
    let job = mock::job();
    let pending = Evaluation {
        status: EvalStatus::Pending,
        ..mock::eval_for(&job)
    };
    let deployment = successful_deployment(&job);
    let alloc = deployment_alloc(&deployment, &pending);
    h.put_evals(&[&pending]).await;
    h.put_deployment(&deployment).await;
    h.put_allocs(&[&alloc]).await;
    h.age(2 * HOUR);

    let report = h.run(CoreJobType::DeploymentGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.deployment_by_id(&deployment.id).is_some());
    assert!(h.store.alloc_by_id(&alloc.id).is_some());
    assert!(h.store.eval_by_id(&pending.id).is_some());
}

#[tokio::test]
async fn test_force_gc_keeps_deployment_with_pending_alloc_eval() {
    let h = Harness::new();
    let job = mock::job();
    let pending = Evaluation {
        status: EvalStatus::Pending,
        ..mock::eval_for(&job)
    };
    let deployment = successful_deployment(&job);
    let alloc = deployment_alloc(&deployment, &pending);
    h.put_evals(&[&pending]).await;
    h.put_deployment(&deployment).await;
    h.put_allocs(&[&alloc]).await;

    let report = h.run(CoreJobType::ForceGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.deployment_by_id(&deployment.id).is_some());
    assert!(h.store.alloc_by_id(&alloc.id).is_some());
    assert!(h.store.eval_by_id(&pending.id).is_some());
}

#[tokio::test]
async fn test_deployment_gc_leaves_finished_eval_to_eval_gc() {
    let h = Harness::new();
    let job = mock::job();
    let finished = Evaluation {
        status: EvalStatus::Complete,
        ..mock::eval_for(&job)
    };
    let deployment = successful_deployment(&job);
    let alloc = deployment_alloc(&deployment, &finished);
    h.put_evals(&[&finished]).await;
    h.put_deployment(&deployment).await;
    h.put_allocs(&[&alloc]).await;
    h.age(2 * HOUR);

    let report = h.run(CoreJobType::DeploymentGc).await.unwrap();

    assert_eq!(report.collected(ObjectClass::Deployment), 1);
    assert_eq!(report.collected(ObjectClass::Alloc), 1);
    assert_eq!(report.collected(ObjectClass::Eval), 0);
    assert!(h.store.deployment_by_id(&deployment.id).is_none());
    assert!(h.store.alloc_by_id(&alloc.id).is_none());
    assert!(h.store.eval_by_id(&finished.id).is_some());
}

#[tokio::test]
async fn test_running_deployment_is_kept() {
    let h = Harness::new();
    let deployment = mock::deployment();
    h.put_deployment(&deployment).await;
    h.age(2 * HOUR);

    let report = h.run(CoreJobType::DeploymentGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.deployment_by_id(&deployment.id).is_some());
}

#[tokio::test]
async fn test_force_gc_ignores_age() {
    let h = Harness::new();
    let job = mock::dead_job();
    let eval = Evaluation {
        status: EvalStatus::Complete,
        ..mock::eval_for(&job)
    };
    let orphan = failed_eval();
    let node = down_node();
    h.put_job(&job).await;
    h.put_evals(&[&eval, &orphan]).await;
    h.put_node(&node).await;

    let report = h.run(CoreJobType::ForceGc).await.unwrap();

    assert_eq!(report.collected(ObjectClass::Job), 1);
    assert_eq!(report.collected(ObjectClass::Eval), 2);
    assert_eq!(report.collected(ObjectClass::Node), 1);
    assert!(h.store.job_by_id(&job.id).is_none());
    assert!(h.store.eval_by_id(&orphan.id).is_none());
    assert!(h.store.node_by_id(&node.id).is_none());
}

#[tokio::test]
async fn test_force_gc_respects_live_dependents() {
    let h = Harness::new();
    let eval = failed_eval();
    let live = running_alloc(&eval);
    h.put_evals(&[&eval]).await;
    h.put_allocs(&[&live]).await;

    let report = h.run(CoreJobType::ForceGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.eval_by_id(&eval.id).is_some());
}

#[tokio::test]
async fn test_batches_respect_max_ids() {
    let h = Harness::with_config(GcConfig {
        max_ids_per_batch: 2,
        ..GcConfig::default()
    });
    let evals: Vec<Evaluation> = (0..3).map(|_| failed_eval()).collect();
    let allocs: Vec<Allocation> = evals.iter().map(stopped_alloc).collect();
    h.put_evals(&evals.iter().collect::<Vec<_>>()).await;
    h.put_allocs(&allocs.iter().collect::<Vec<_>>()).await;
    h.age(2 * HOUR);

    let before = h.log.last_index();
    let report = h.run(CoreJobType::EvalGc).await.unwrap();

    assert_eq!(report.total(), 6);
    assert_eq!(report.batches_submitted, 3);
    assert_eq!(report.applied_index, Some(LogIndex::new(before.value() + 3)));
    for eval in &evals {
        assert!(h.store.eval_by_id(&eval.id).is_none());
    }
}

#[tokio::test]
async fn test_plan_is_idempotent() {
    let h = Harness::new();
    let eval = failed_eval();
    let alloc = stopped_alloc(&eval);
    h.put_evals(&[&eval]).await;
    h.put_allocs(&[&alloc]).await;
    h.put_node(&down_node()).await;
    h.age(48 * HOUR);

    let mut scheduler = h.scheduler();
    let job = h.job(CoreJobType::ForceGc);
    let first = scheduler.plan(&job).await.unwrap();
    let second = scheduler.plan(&job).await.unwrap();

    assert_eq!(first.batch, second.batch);
    assert_eq!(first.now, second.now);
    assert_eq!(first.batch.len(), 3);
}

#[tokio::test]
async fn test_repeated_passes_submit_the_same_batches() {
    let h = Harness::with_config(GcConfig {
        max_ids_per_batch: 2,
        ..GcConfig::default()
    });
    let evals: Vec<Evaluation> = (0..2).map(|_| failed_eval()).collect();
    let allocs: Vec<Allocation> = evals.iter().map(stopped_alloc).collect();
    h.put_evals(&evals.iter().collect::<Vec<_>>()).await;
    h.put_allocs(&allocs.iter().collect::<Vec<_>>()).await;
    h.put_node(&down_node()).await;
    h.age(48 * HOUR);

    let log = Arc::new(RecordingLog::new(h.store.clone()));
    let mut scheduler =
        CoreScheduler::new(h.services_with_log(log.clone()), h.store.snapshot().unwrap());
    let job = h.job(CoreJobType::ForceGc);

    scheduler.process(&job).await.unwrap();
    let first = log.take();
    scheduler.process(&job).await.unwrap();
    let second = log.take();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_down_node_with_finished_allocs_is_collected() {
    let h = Harness::new();
    let node = down_node();
    let eval = failed_eval();
    let alloc = Allocation {
        node_id: node.id,
        ..stopped_alloc(&eval)
    };
    h.put_node(&node).await;
    h.put_evals(&[&eval]).await;
    h.put_allocs(&[&alloc]).await;
    h.age(48 * HOUR);

    let report = h.run(CoreJobType::NodeGc).await.unwrap();

    assert_eq!(report.collected(ObjectClass::Node), 1);
    assert!(h.store.node_by_id(&node.id).is_none());
    assert!(h.store.alloc_by_id(&alloc.id).is_some());
}

#[tokio::test]
async fn test_rejected_submission_leaves_state() {
    let h = Harness::new();
    let eval = failed_eval();
    h.put_evals(&[&eval]).await;
    h.age(2 * HOUR);

    let log = Arc::new(RejectingLog {
        store: h.store.clone(),
    });
    let mut scheduler = CoreScheduler::new(h.services_with_log(log), h.store.snapshot().unwrap());
    let err = scheduler
        .process(&h.job(CoreJobType::EvalGc))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreSchedError::Apply(ApplyError::NotLeader)));
    assert!(err.is_retryable());
    assert!(h.store.eval_by_id(&eval.id).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_submission_times_out() {
    let h = Harness::with_config(GcConfig {
        apply_timeout: Duration::from_secs(5),
        ..GcConfig::default()
    });
    let eval = failed_eval();
    h.put_evals(&[&eval]).await;
    h.age(2 * HOUR);

    let job = h.job(CoreJobType::EvalGc);
    let mut scheduler =
        CoreScheduler::new(h.services_with_log(Arc::new(StalledLog)), h.store.snapshot().unwrap());
    let err = scheduler.process(&job).await.unwrap_err();

    assert!(matches!(err, CoreSchedError::ApplyTimeout(d) if d == Duration::from_secs(5)));
    assert!(h.store.eval_by_id(&eval.id).is_some());
}

#[tokio::test]
async fn test_shutdown_stops_before_submission() {
    let h = Harness::new();
    let eval = failed_eval();
    h.put_evals(&[&eval]).await;
    h.age(2 * HOUR);

    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let mut scheduler =
        CoreScheduler::new(h.services().with_shutdown(rx), h.store.snapshot().unwrap());
    let before = h.log.last_index();
    let err = scheduler
        .process(&h.job(CoreJobType::EvalGc))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreSchedError::Shutdown));
    assert!(!err.is_retryable());
    assert_eq!(h.log.last_index(), before);
    assert!(h.store.eval_by_id(&eval.id).is_some());
}

#[tokio::test]
async fn test_snapshot_behind_log_is_unavailable() {
    let h = Harness::with_config(GcConfig {
        snapshot_wait: Duration::from_millis(20),
        ..GcConfig::default()
    });
    h.put_evals(&[&failed_eval()]).await;

    let log = Arc::new(AheadLog {
        last: LogIndex::new(10_000),
    });
    let mut scheduler = CoreScheduler::new(h.services_with_log(log), h.store.snapshot().unwrap());
    let job = CoreJob::new(CoreJobType::EvalGc, LogIndex::new(10_000));
    let err = scheduler.process(&job).await.unwrap_err();

    assert!(matches!(
        err,
        CoreSchedError::State(StateError::SnapshotUnavailable { .. })
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_stale_snapshot_is_refreshed() {
    let h = Harness::new();
    let stale = h.store.snapshot().unwrap();
    let eval = failed_eval();
    h.put_evals(&[&eval]).await;
    h.age(2 * HOUR);

    let mut scheduler = CoreScheduler::new(h.services(), stale);
    let plan = scheduler.plan(&h.job(CoreJobType::EvalGc)).await.unwrap();

    assert_eq!(plan.snapshot_index, h.log.last_index());
    assert_eq!(scheduler.snapshot().index(), h.log.last_index());
    assert!(plan
        .batch
        .commands()
        .contains(&DeleteCommand::Eval(eval.id)));
}

#[tokio::test]
async fn test_empty_time_table_collects_nothing() {
    let h = Harness::new();
    let eval = failed_eval();
    h.store
        .upsert_evals(LogIndex::new(10), vec![eval.clone()])
        .unwrap();
    h.age(48 * HOUR);

    let report = h.run(CoreJobType::EvalGc).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(h.store.eval_by_id(&eval.id).is_some());
}

#[tokio::test]
async fn test_now_follows_anchor_when_clock_lags() {
    let h = Harness::new();
    let ahead = h.clock.now() + chrono::Duration::hours(1);
    h.time_table.witness(LogIndex::new(5), ahead);

    let job = CoreJob::new(CoreJobType::EvalGc, LogIndex::new(5));
    let plan = h.scheduler().plan(&job).await.unwrap();

    assert_eq!(plan.now, ahead);
    assert!(plan.batch.is_empty());
}
