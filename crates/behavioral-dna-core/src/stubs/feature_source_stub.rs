//! In-memory implementation of [`FeatureSource`].
//!
//! Development and test backend holding raw feature rows per dimension.
//! Thread-safe via `DashMap`.

use dashmap::DashMap;
use uuid::Uuid;

use crate::traits::FeatureSource;

/// One entity's data for one dimension.
#[derive(Debug, Clone)]
struct EntityRow {
    features: Vec<Option<f32>>,
    observations: usize,
}

/// In-memory raw feature table keyed by dimension name.
#[derive(Debug, Default)]
pub struct InMemoryFeatureSource {
    dimensions: DashMap<String, DashMap<Uuid, EntityRow>>,
}

impl InMemoryFeatureSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) an entity's raw row for a dimension.
    pub fn insert(
        &self,
        dimension: &str,
        entity_id: Uuid,
        features: Vec<Option<f32>>,
        observations: usize,
    ) {
        self.dimensions
            .entry(dimension.to_string())
            .or_default()
            .insert(
                entity_id,
                EntityRow {
                    features,
                    observations,
                },
            );
    }

    /// Number of entities recorded for a dimension.
    pub fn population(&self, dimension: &str) -> usize {
        self.dimensions
            .get(dimension)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }
}

impl FeatureSource for InMemoryFeatureSource {
    fn entity_ids(&self, dimension: &str) -> Vec<Uuid> {
        self.dimensions
            .get(dimension)
            .map(|rows| rows.iter().map(|entry| *entry.key()).collect())
            .unwrap_or_default()
    }

    fn raw_features(&self, entity_id: Uuid, dimension: &str) -> Option<Vec<Option<f32>>> {
        self.dimensions
            .get(dimension)?
            .get(&entity_id)
            .map(|row| row.features.clone())
    }

    fn observation_count(&self, entity_id: Uuid, dimension: &str) -> usize {
        self.dimensions
            .get(dimension)
            .and_then(|rows| rows.get(&entity_id).map(|row| row.observations))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let source = InMemoryFeatureSource::new();
        let entity = Uuid::new_v4();
        source.insert("spend", entity, vec![Some(3.0), None], 12);

        assert_eq!(source.population("spend"), 1);
        assert_eq!(source.entity_ids("spend"), vec![entity]);
        assert_eq!(
            source.raw_features(entity, "spend"),
            Some(vec![Some(3.0), None])
        );
        assert_eq!(source.observation_count(entity, "spend"), 12);

        assert!(source.raw_features(entity, "engagement").is_none());
        assert_eq!(source.observation_count(entity, "engagement"), 0);
    }
}
