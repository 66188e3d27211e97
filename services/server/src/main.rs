//! orca server
//!
//! Runs the housekeeping side of a cluster server: the time table that maps
//! log indexes to wall-clock time, and the core job dispatcher that
//! periodically garbage collects terminal evaluations, allocations, nodes,
//! jobs and deployments.

use std::sync::Arc;

use anyhow::Result;
use orca_server::{
    config,
    core_sched::CoreServices,
    dispatcher::CoreJobDispatcher,
    log::LocalLog,
    persist,
};
use orca_state::StateStore;
use orca_timetable::{Clock, SystemClock, TimeTable};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to ORCA_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting orca server");
    info!(
        eval_gc_threshold_secs = config.gc.eval_gc_threshold.as_secs(),
        node_gc_threshold_secs = config.gc.node_gc_threshold.as_secs(),
        job_gc_threshold_secs = config.gc.job_gc_threshold.as_secs(),
        deployment_gc_threshold_secs = config.gc.deployment_gc_threshold.as_secs(),
        time_table_capacity = config.time_table.capacity(),
        "Configuration loaded"
    );

    let store = Arc::new(StateStore::new());
    let time_table = Arc::new(TimeTable::new(config.time_table));
    if let Some(path) = &config.time_table_path {
        persist::load_time_table(path, &time_table).await?;
    }
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let log = Arc::new(LocalLog::new(store.clone(), time_table.clone(), clock.clone()));

    let services = CoreServices::new(
        config.gc.clone(),
        time_table.clone(),
        log,
        store.clone(),
        clock,
    );
    let dispatcher = Arc::new(CoreJobDispatcher::new(services, store.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);

    info!("Waiting for core job workers to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);
    if let Err(e) = tokio::time::timeout(shutdown_timeout, dispatcher_handle).await {
        warn!(error = %e, "Core job dispatcher did not shut down in time");
    }

    store.close();
    if let Some(path) = &config.time_table_path {
        if let Err(e) = persist::save_time_table(path, &time_table).await {
            error!(error = %e, "Failed to save time table");
        }
    }
    info!("orca server shutdown complete");
    Ok(())
}
