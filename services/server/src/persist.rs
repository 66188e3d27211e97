//! Time table persistence across restarts.
//!
//! Without saved witness points a restarted server has no age information
//! until the log has advanced for a full threshold, so nothing could be
//! collected for hours. The table is small and is written as JSON.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use orca_timetable::{TimeTable, WitnessPoint};
use tracing::info;

/// Loads saved points into `time_table`. A missing file is not an error.
/// Returns the number of points retained.
pub async fn load_time_table(path: &Path, time_table: &TimeTable) -> Result<usize> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No saved time table, starting empty");
            return Ok(0);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading time table {}", path.display()))
        }
    };

    let points: Vec<WitnessPoint> = serde_json::from_slice(&bytes)
        .with_context(|| format!("decoding time table {}", path.display()))?;
    time_table.restore(points);

    let restored = time_table.len();
    info!(path = %path.display(), points = restored, "Restored time table");
    Ok(restored)
}

/// Writes the table's points to `path`, replacing the file atomically.
pub async fn save_time_table(path: &Path, time_table: &TimeTable) -> Result<()> {
    let points = time_table.points();
    let bytes = serde_json::to_vec(&points).context("encoding time table")?;

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))?;

    info!(path = %path.display(), points = points.len(), "Saved time table");
    Ok(())
}
