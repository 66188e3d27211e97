//! Log index to wall-clock time mapping.
//!
//! Records stored in the replicated state carry the log index of their last
//! write, not a trustworthy timestamp. The [`TimeTable`] keeps a bounded set
//! of witness points `(index, time)` observed as the log advances, which is
//! enough to answer "roughly when was index N applied" and the inverse.
//!
//! # Invariants
//!
//! - Witness indexes are strictly increasing and times non-decreasing
//! - Lookups are monotonic: `i1 < i2` implies
//!   `nearest_time(i1) <= nearest_time(i2)`
//! - Only the newest `limit / granularity` points are retained

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use orca_id::LogIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The process clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += to_delta(by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Converts a std duration, saturating instead of failing on overflow.
pub fn to_delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// A recorded correspondence between a log index and a wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessPoint {
    pub index: LogIndex,
    pub time: DateTime<Utc>,
}

/// Sizing of a [`TimeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeTableConfig {
    /// Minimum wall-clock spacing between two recorded points.
    pub granularity: Duration,

    /// How far back the table reaches.
    pub limit: Duration,
}

impl Default for TimeTableConfig {
    fn default() -> Self {
        Self {
            granularity: Duration::from_secs(5 * 60),
            limit: Duration::from_secs(72 * 60 * 60),
        }
    }
}

impl TimeTableConfig {
    /// Number of points the table retains.
    pub fn capacity(&self) -> usize {
        let granularity = self.granularity.as_nanos().max(1);
        let capacity = (self.limit.as_nanos() / granularity).max(1);
        usize::try_from(capacity).unwrap_or(usize::MAX)
    }
}

/// Bounded, thread-safe index/time witness table.
///
/// `witness` is called from the log apply path while GC passes read; a
/// single lock is enough given the small, fixed size.
#[derive(Debug)]
pub struct TimeTable {
    granularity: chrono::Duration,
    capacity: usize,
    points: RwLock<VecDeque<WitnessPoint>>,
}

impl Default for TimeTable {
    fn default() -> Self {
        Self::new(TimeTableConfig::default())
    }
}

impl TimeTable {
    pub fn new(config: TimeTableConfig) -> Self {
        let capacity = config.capacity();
        Self {
            granularity: to_delta(config.granularity),
            capacity,
            points: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Records that `index` had been applied at `time`.
    ///
    /// Stale or out-of-order witnesses are dropped, as are witnesses that
    /// arrive within `granularity` of the newest point. Returns whether the
    /// point was recorded.
    pub fn witness(&self, index: LogIndex, time: DateTime<Utc>) -> bool {
        let mut points = self.points.write().unwrap_or_else(PoisonError::into_inner);
        self.admit(&mut points, WitnessPoint { index, time })
    }

    fn admit(&self, points: &mut VecDeque<WitnessPoint>, point: WitnessPoint) -> bool {
        if let Some(last) = points.back() {
            if point.index <= last.index {
                debug!(index = %point.index, latest = %last.index, "Ignoring stale witness");
                return false;
            }
            let too_close = last
                .time
                .checked_add_signed(self.granularity)
                .is_none_or(|earliest| point.time < earliest);
            if too_close {
                return false;
            }
        }

        points.push_back(point);
        while points.len() > self.capacity {
            points.pop_front();
        }
        true
    }

    /// Time of the newest point whose index is at or before `index`.
    ///
    /// An index older than every point resolves to the oldest point's time.
    /// An empty table has no information and answers with the current
    /// time, which makes every age computed from it zero.
    pub fn nearest_time(&self, index: LogIndex) -> DateTime<Utc> {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        let pos = points.partition_point(|p| p.index <= index);
        match pos.checked_sub(1).and_then(|i| points.get(i)).or(points.front()) {
            Some(point) => point.time,
            None => Utc::now(),
        }
    }

    /// Index of the newest point witnessed at or before `time`.
    pub fn nearest_index(&self, time: DateTime<Utc>) -> LogIndex {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        let pos = points.partition_point(|p| p.time <= time);
        pos.checked_sub(1)
            .and_then(|i| points.get(i))
            .map_or(LogIndex::ZERO, |p| p.index)
    }

    /// Latest time at which `index` can have been applied: the time of the
    /// oldest point at or after it. `None` when the index is newer than
    /// every point.
    pub fn time_upper_bound(&self, index: LogIndex) -> Option<DateTime<Utc>> {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        let pos = points.partition_point(|p| p.index < index);
        points.get(pos).map(|p| p.time)
    }

    pub fn is_empty(&self) -> bool {
        self.points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn len(&self) -> usize {
        self.points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the retained points, oldest first, for persisting the table
    /// alongside a state snapshot.
    pub fn points(&self) -> Vec<WitnessPoint> {
        self.points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Replaces the table contents with previously persisted points. The
    /// points go through the same filtering as [`TimeTable::witness`] and
    /// the rebuilt table is swapped in at once.
    pub fn restore<I>(&self, points: I)
    where
        I: IntoIterator<Item = WitnessPoint>,
    {
        let mut rebuilt = VecDeque::with_capacity(self.capacity.min(1024));
        for point in points {
            self.admit(&mut rebuilt, point);
        }
        *self.points.write().unwrap_or_else(PoisonError::into_inner) = rebuilt;
    }
}
