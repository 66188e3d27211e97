//! Core scheduler for cluster housekeeping.
//!
//! The core scheduler runs one garbage collection pass per core job:
//! - Resolving the pass's notion of "now" through the time table
//! - Reading a consistent snapshot at least as fresh as the job
//! - Deciding which terminal objects are old enough and unreferenced
//! - Submitting ordered, size-bounded deletion batches to the log
//!
//! Decisions are a pure function of the snapshot, the time table and the
//! configuration, so a pass that fails half way can simply be re-driven.

pub mod eligibility;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use orca_state::{SnapshotSource, StateError};
use orca_timetable::{Clock, TimeTable};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::GcConfig;
use crate::log::{ApplyError, LogApplier};

pub use scheduler::{CoreScheduler, GcPlan, PassReport};

/// Result type for core scheduler operations.
pub type CoreSchedResult<T> = Result<T, CoreSchedError>;

/// Errors that abort a pass.
#[derive(Debug, Error)]
pub enum CoreSchedError {
    #[error("snapshot unavailable: {0}")]
    State(#[from] StateError),

    #[error("log submission failed: {0}")]
    Apply(#[from] ApplyError),

    #[error("log submission timed out after {0:?}")]
    ApplyTimeout(Duration),

    #[error("pass aborted by shutdown before submission")]
    Shutdown,
}

impl CoreSchedError {
    /// Whether the next scheduled pass can expect to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreSchedError::State(e) => e.is_retryable(),
            CoreSchedError::Apply(e) => e.is_retryable(),
            CoreSchedError::ApplyTimeout(_) => true,
            CoreSchedError::Shutdown => false,
        }
    }
}

/// Collaborators a pass needs.
#[derive(Clone)]
pub struct CoreServices {
    pub config: GcConfig,
    pub time_table: Arc<TimeTable>,
    pub log: Arc<dyn LogApplier>,
    pub state: Arc<dyn SnapshotSource>,
    pub clock: Arc<dyn Clock>,
    /// When set to true, passes stop before submitting anything further.
    pub shutdown: Option<watch::Receiver<bool>>,
}

impl CoreServices {
    pub fn new(
        config: GcConfig,
        time_table: Arc<TimeTable>,
        log: Arc<dyn LogApplier>,
        state: Arc<dyn SnapshotSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            time_table,
            log,
            state,
            clock,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}
