//! Versioned dimension registry with atomic publication.
//!
//! Calibration produces immutable [`Dimension`] artifacts; the registry is
//! the single point where a new version becomes visible. Publication swaps
//! the current pointer for a name in one operation, so categorization
//! running concurrently either sees the old complete version or the new
//! complete version, never a partial one. Old versions stay resolvable by
//! id for journey comparisons across recalibration boundaries.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::types::Dimension;

/// Concurrent registry of published dimension versions.
///
/// Thread-safe without external locking; all methods take `&self`.
#[derive(Debug, Default)]
pub struct DimensionRegistry {
    /// Current version per dimension name.
    current: DashMap<String, Arc<Dimension>>,
    /// Every published version by id, for cross-version lookups.
    versions: DashMap<Uuid, Arc<Dimension>>,
}

impl DimensionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a calibrated dimension, making it the current version for
    /// its name. Returns the shared handle.
    pub fn publish(&self, dimension: Dimension) -> Arc<Dimension> {
        let shared = Arc::new(dimension);
        self.versions.insert(shared.version.id, Arc::clone(&shared));
        self.current.insert(shared.name.clone(), Arc::clone(&shared));
        info!(
            dimension = %shared.name,
            version = %shared.version.id,
            ordinal = shared.version.ordinal,
            segments = shared.segments.len(),
            "published dimension version"
        );
        shared
    }

    /// The current version for a dimension name.
    pub fn current(&self, name: &str) -> Option<Arc<Dimension>> {
        self.current.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up any published version by id.
    pub fn by_version(&self, id: Uuid) -> Option<Arc<Dimension>> {
        self.versions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Names with a current version, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.current.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Current versions of all dimensions, in no particular order.
    pub fn all_current(&self) -> Vec<Arc<Dimension>> {
        self.current
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of dimension names with a current version.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// True when nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}
