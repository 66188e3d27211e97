//! Periodic core job worker.

use std::sync::Arc;
use std::time::Duration;

use orca_structs::CoreJobType;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::CoreJobDispatcher;
use crate::core_sched::CoreSchedError;

/// Runs one core job type on a fixed interval.
pub struct PeriodicWorker {
    dispatcher: Arc<CoreJobDispatcher>,
    job_type: CoreJobType,
    interval: Duration,
}

impl PeriodicWorker {
    pub fn new(dispatcher: Arc<CoreJobDispatcher>, job_type: CoreJobType, interval: Duration) -> Self {
        Self {
            dispatcher,
            job_type,
            interval,
        }
    }

    /// Run the worker until shutdown is signaled.
    #[instrument(skip(self, shutdown), fields(job_type = %self.job_type))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Starting core job worker");

        // Passes observe the same shutdown signal so a long pass stops
        // between batches.
        let dispatcher = self.dispatcher.with_shutdown(shutdown.clone());

        let mut interval = tokio::time::interval(self.interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match dispatcher.run_once(self.job_type).await {
                        Ok(report) => {
                            debug!(collected = report.total(), "Core job finished");
                        }
                        Err(CoreSchedError::Shutdown) => {
                            info!("Core job abandoned for shutdown");
                        }
                        Err(e) if e.is_retryable() => {
                            warn!(error = %e, "Core job failed, retrying next interval");
                        }
                        Err(e) => {
                            error!(error = %e, "Core job failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Core job worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
