//! In-memory implementation of [`SnapshotStore`].
//!
//! Development and test backend. Thread-safe via `DashMap`; per-entity logs
//! are kept sorted by capture time so range and latest queries behave like
//! a real ordered log. Data lives only as long as the process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::traits::{SnapshotStore, TimeRange};
use crate::types::{RetentionClass, Snapshot};

/// In-memory append-only snapshot log.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    entries: DashMap<Uuid, Vec<Snapshot>>,
}

impl InMemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total snapshots across all entities.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    /// True when nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn append(&self, snapshot: Snapshot) -> CoreResult<Uuid> {
        let id = snapshot.id;
        let entity_id = snapshot.entity_id;

        let mut log = self.entries.entry(entity_id).or_default();
        log.push(snapshot);
        log.sort_by_key(|s| s.captured_at);
        Ok(id)
    }

    async fn history(&self, entity_id: Uuid, range: TimeRange) -> CoreResult<Vec<Snapshot>> {
        Ok(self
            .entries
            .get(&entity_id)
            .map(|log| {
                log.iter()
                    .filter(|s| range.contains(s.captured_at))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn latest(&self, entity_id: Uuid, limit: usize) -> CoreResult<Vec<Snapshot>> {
        Ok(self
            .entries
            .get(&entity_id)
            .map(|log| {
                let skip = log.len().saturating_sub(limit);
                log.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default())
    }

    async fn expire_before(
        &self,
        retention: RetentionClass,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<usize> {
        let mut removed = 0usize;
        for mut entry in self.entries.iter_mut() {
            let log = entry.value_mut();
            let before = log.len();
            log.retain(|s| !(s.retention == retention && s.captured_at < cutoff));
            removed += before - log.len();
        }
        Ok(removed)
    }
}
