//! Core job dispatcher.
//!
//! Creates core jobs on a fixed cadence, one periodic worker per job type,
//! and hands each to a fresh [`CoreScheduler`]. A failed pass is logged and
//! left for the next tick; nothing is retried inside a pass.

mod worker;

use std::sync::Arc;

use orca_state::StateStore;
use orca_structs::{CoreJob, CoreJobType};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::core_sched::{CoreSchedResult, CoreScheduler, CoreServices, PassReport};

pub use worker::PeriodicWorker;

pub struct CoreJobDispatcher {
    services: CoreServices,
    store: Arc<StateStore>,
}

impl CoreJobDispatcher {
    pub fn new(services: CoreServices, store: Arc<StateStore>) -> Self {
        Self { services, store }
    }

    /// Creates a core job of `job_type` at the log's current index and runs
    /// it to completion.
    pub async fn run_once(&self, job_type: CoreJobType) -> CoreSchedResult<PassReport> {
        let job = CoreJob::new(job_type, self.services.log.last_index());
        let snapshot = self.store.snapshot()?;
        CoreScheduler::new(self.services.clone(), snapshot)
            .process(&job)
            .await
    }

    /// Runs every periodic worker until shutdown is signaled.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let mut handles = Vec::new();
        for job_type in CoreJobType::PERIODIC {
            let Some(interval) = self.services.config.interval_for(job_type) else {
                continue;
            };
            let worker = PeriodicWorker::new(self.clone(), job_type, interval);
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move { worker.run(shutdown).await }));
        }
        info!(workers = handles.len(), "Core job dispatcher started");

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Core job worker panicked");
            }
        }
        info!("Core job dispatcher stopped");
    }

    fn with_shutdown(&self, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            services: self.services.clone().with_shutdown(shutdown),
            store: self.store.clone(),
        }
    }
}
