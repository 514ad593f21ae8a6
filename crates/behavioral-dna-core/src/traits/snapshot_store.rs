//! Snapshot store trait: an append-only ordered log per entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreResult;
use crate::types::{RetentionClass, Snapshot};

/// Half-open time window for history queries. `None` bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// The unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    /// A range with both bounds set.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Whether a timestamp falls inside the range.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if at < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if at >= end {
                return false;
            }
        }
        true
    }
}

/// Abstract append-only store of timestamped behavioral DNA per entity.
///
/// Snapshots are immutable once appended; duplicates for the same
/// entity/timestamp are tolerated (drift analysis simply takes the latest
/// two in a window). Retention cadence and expiry policy are supplied by
/// the caller. [`expire_before`] is the hook, not the policy.
///
/// [`expire_before`]: SnapshotStore::expire_before
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Append a snapshot and return its id.
    async fn append(&self, snapshot: Snapshot) -> CoreResult<Uuid>;

    /// All snapshots for an entity inside the window, ordered by capture
    /// time ascending.
    async fn history(&self, entity_id: Uuid, range: TimeRange) -> CoreResult<Vec<Snapshot>>;

    /// The most recent `limit` snapshots for an entity, ordered by capture
    /// time ascending.
    async fn latest(&self, entity_id: Uuid, limit: usize) -> CoreResult<Vec<Snapshot>>;

    /// Delete snapshots of one retention class captured before the cutoff.
    /// Returns how many were removed.
    async fn expire_before(
        &self,
        retention: RetentionClass,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_range_bounds() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let range = TimeRange::between(start, end);

        assert!(range.contains(start), "start is inclusive");
        assert!(!range.contains(end), "end is exclusive");
        assert!(range.contains(Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()));
        assert!(TimeRange::all().contains(start));
    }
}
