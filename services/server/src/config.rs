use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use orca_structs::CoreJobType;
use orca_timetable::TimeTableConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub gc: GcConfig,
    pub time_table: TimeTableConfig,
    /// Where the time table is saved on shutdown and reloaded on start.
    pub time_table_path: Option<PathBuf>,
}

/// Thresholds, intervals and limits for garbage collection passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    /// Minimum age of a terminal evaluation before it is reclaimed.
    pub eval_gc_threshold: Duration,
    /// Minimum time a node must have been down before it is reclaimed.
    pub node_gc_threshold: Duration,
    /// Minimum age of a dead job before it is reclaimed.
    pub job_gc_threshold: Duration,
    /// Minimum age of a finished deployment before it is reclaimed.
    pub deployment_gc_threshold: Duration,

    pub eval_gc_interval: Duration,
    pub node_gc_interval: Duration,
    pub job_gc_interval: Duration,
    pub deployment_gc_interval: Duration,

    /// Upper bound on deletions carried by one log entry.
    pub max_ids_per_batch: usize,
    /// How long one log submission may take before the pass is aborted.
    pub apply_timeout: Duration,
    /// How long a pass waits for the store to reach the job's index.
    pub snapshot_wait: Duration,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            eval_gc_threshold: Duration::from_secs(60 * 60),
            node_gc_threshold: Duration::from_secs(24 * 60 * 60),
            job_gc_threshold: Duration::from_secs(4 * 60 * 60),
            deployment_gc_threshold: Duration::from_secs(60 * 60),
            eval_gc_interval: Duration::from_secs(5 * 60),
            node_gc_interval: Duration::from_secs(5 * 60),
            job_gc_interval: Duration::from_secs(5 * 60),
            deployment_gc_interval: Duration::from_secs(5 * 60),
            max_ids_per_batch: 7281,
            apply_timeout: Duration::from_secs(30),
            snapshot_wait: Duration::from_secs(5),
        }
    }
}

impl GcConfig {
    /// How often the dispatcher creates a job of this type. Force GC is
    /// never periodic.
    pub fn interval_for(&self, job_type: CoreJobType) -> Option<Duration> {
        match job_type {
            CoreJobType::EvalGc => Some(self.eval_gc_interval),
            CoreJobType::NodeGc => Some(self.node_gc_interval),
            CoreJobType::JobGc => Some(self.job_gc_interval),
            CoreJobType::DeploymentGc => Some(self.deployment_gc_interval),
            CoreJobType::ForceGc => None,
        }
    }

    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            eval_gc_threshold: env_secs("ORCA_EVAL_GC_THRESHOLD", defaults.eval_gc_threshold),
            node_gc_threshold: env_secs("ORCA_NODE_GC_THRESHOLD", defaults.node_gc_threshold),
            job_gc_threshold: env_secs("ORCA_JOB_GC_THRESHOLD", defaults.job_gc_threshold),
            deployment_gc_threshold: env_secs(
                "ORCA_DEPLOYMENT_GC_THRESHOLD",
                defaults.deployment_gc_threshold,
            ),
            eval_gc_interval: env_secs("ORCA_EVAL_GC_INTERVAL", defaults.eval_gc_interval),
            node_gc_interval: env_secs("ORCA_NODE_GC_INTERVAL", defaults.node_gc_interval),
            job_gc_interval: env_secs("ORCA_JOB_GC_INTERVAL", defaults.job_gc_interval),
            deployment_gc_interval: env_secs(
                "ORCA_DEPLOYMENT_GC_INTERVAL",
                defaults.deployment_gc_interval,
            ),
            max_ids_per_batch: std::env::var("ORCA_GC_MAX_IDS_PER_BATCH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_ids_per_batch),
            apply_timeout: env_secs("ORCA_GC_APPLY_TIMEOUT", defaults.apply_timeout),
            snapshot_wait: env_secs("ORCA_GC_SNAPSHOT_WAIT", defaults.snapshot_wait),
        }
    }
}

impl Config {
    /// Loads configuration from `ORCA_*` environment variables. Durations
    /// are given in whole seconds.
    pub fn from_env() -> Result<Self> {
        let log_level = std::env::var("ORCA_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let table_defaults = TimeTableConfig::default();
        let time_table = TimeTableConfig {
            granularity: env_secs("ORCA_TIME_TABLE_GRANULARITY", table_defaults.granularity),
            limit: env_secs("ORCA_TIME_TABLE_LIMIT", table_defaults.limit),
        };

        let time_table_path = std::env::var("ORCA_TIME_TABLE_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let config = Self {
            log_level,
            gc: GcConfig::from_env(),
            time_table,
            time_table_path,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for job_type in CoreJobType::PERIODIC {
            if self.gc.interval_for(job_type).is_some_and(|i| i.is_zero()) {
                bail!("{job_type} interval must be greater than zero");
            }
        }
        if self.gc.max_ids_per_batch == 0 {
            bail!("max_ids_per_batch must be at least 1");
        }
        if self.time_table.granularity.is_zero() {
            bail!("time table granularity must be greater than zero");
        }
        if self.time_table.limit < self.time_table.granularity {
            bail!(
                "time table limit ({:?}) cannot be shorter than its granularity ({:?})",
                self.time_table.limit,
                self.time_table.granularity
            );
        }
        Ok(())
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
