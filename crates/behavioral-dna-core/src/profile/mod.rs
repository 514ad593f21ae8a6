//! Multi-axis profile composition.
//!
//! Categorization is the read side of the system: it projects an entity's
//! raw features against every published dimension version (inference mode,
//! no re-fitting) and assembles the resulting membership vectors into one
//! [`BehavioralDna`]. It only reads immutable calibration artifacts, so it
//! runs fully in parallel across entities with no locking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clustering::soft_membership;
use crate::error::{CoreError, CoreResult};
use crate::features::scale_row;
use crate::traits::FeatureSource;
use crate::types::{BehavioralDna, Dimension, DimensionMembership, MembershipVector, SegmentId};

/// Default minimum raw observations before a fingerprint is trusted.
pub const DEFAULT_MIN_OBSERVATIONS: usize = 10;

/// Parameters for profile composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Entities with fewer total observations than this get a cold-start
    /// fingerprint: composed, but explicitly marked unreliable.
    pub min_observations: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            min_observations: DEFAULT_MIN_OBSERVATIONS,
        }
    }
}

impl ProfileConfig {
    /// Set the cold-start observation floor.
    #[must_use]
    pub fn with_min_observations(mut self, min_observations: usize) -> Self {
        self.min_observations = min_observations;
        self
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConfigError` for a zero floor, which would make
    /// every entity look warm.
    pub fn validate(&self) -> CoreResult<()> {
        if self.min_observations == 0 {
            return Err(CoreError::ConfigError(
                "min_observations must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Composes behavioral DNA from published dimension versions.
#[derive(Debug, Clone, Default)]
pub struct ProfileComposer {
    config: ProfileConfig,
}

impl ProfileComposer {
    /// Create a composer with the given configuration.
    pub fn new(config: ProfileConfig) -> Self {
        Self { config }
    }

    /// Compose one entity's DNA across the given dimension versions.
    ///
    /// Dimensions where the entity has zero usable features are absent from
    /// the result (they lower coverage); a membership vector is never
    /// fabricated. Entities below the observation floor get `cold_start =
    /// true` and callers must check it before acting.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ValidationError` if a projected membership
    /// violates the sum-to-one invariant (an engine bug surfaced rather
    /// than stored).
    pub fn categorize(
        &self,
        entity_id: Uuid,
        dimensions: &[Arc<Dimension>],
        source: &dyn FeatureSource,
    ) -> CoreResult<BehavioralDna> {
        self.config.validate()?;

        let mut memberships = BTreeMap::new();
        let mut top_weights = Vec::new();
        let mut observations = 0usize;

        for dimension in dimensions {
            let Some(raw) = source.raw_features(entity_id, &dimension.name) else {
                continue;
            };
            let Some(scaled) = scale_row(&raw, &dimension.scalers) else {
                debug!(
                    entity = %entity_id,
                    dimension = %dimension.name,
                    "entity has no usable features for dimension, skipping"
                );
                continue;
            };

            let vector = Self::project(&scaled, dimension)?;
            if let Some((_, weight)) = vector.dominant() {
                top_weights.push(weight);
            }
            observations += source.observation_count(entity_id, &dimension.name);

            memberships.insert(
                dimension.name.clone(),
                DimensionMembership {
                    version: dimension.version.id,
                    vector,
                },
            );
        }

        let coverage = if dimensions.is_empty() {
            0.0
        } else {
            memberships.len() as f32 / dimensions.len() as f32
        };
        let mean_top = if top_weights.is_empty() {
            0.0
        } else {
            top_weights.iter().sum::<f32>() / top_weights.len() as f32
        };
        let confidence = if memberships.is_empty() {
            0.0
        } else {
            0.5 * coverage + 0.5 * mean_top
        };

        Ok(BehavioralDna {
            entity_id,
            memberships,
            confidence,
            observation_count: observations,
            cold_start: observations < self.config.min_observations,
            computed_at: chrono::Utc::now(),
        })
    }

    /// Project a scaled row onto a dimension's leaf segments using the
    /// fit-time distance-to-membership formula.
    fn project(scaled: &[f32], dimension: &Dimension) -> CoreResult<MembershipVector> {
        let leaves = dimension.leaves();
        let ids: Vec<SegmentId> = leaves.iter().map(|s| s.id).collect();
        let centers: Vec<Vec<f32>> = leaves.iter().map(|s| s.center.clone()).collect();

        let weights = soft_membership(scaled, &centers, dimension.fuzziness());
        MembershipVector::from_parts(&ids, &weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationConfig, Calibrator};
    use crate::clustering::FuzzyParams;
    use crate::stubs::InMemoryFeatureSource;

    /// Calibrate one dimension over two blobs and return it with the source.
    fn calibrated_dimension(name: &str) -> (Arc<Dimension>, InMemoryFeatureSource) {
        let source = InMemoryFeatureSource::new();
        for i in 0..100 {
            let jitter = (i % 5) as f32 * 0.01;
            source.insert(name, Uuid::new_v4(), vec![Some(0.0 + jitter)], 25);
            source.insert(name, Uuid::new_v4(), vec![Some(10.0 + jitter)], 25);
        }

        let config = CalibrationConfig::default()
            .with_min_population(50)
            .with_fuzzy(FuzzyParams::default().with_seed(31));
        let (dimension, _) = Calibrator::new(config).calibrate(name, &source, None).unwrap();
        (Arc::new(dimension), source)
    }

    #[test]
    fn test_categorize_produces_valid_memberships() {
        let (dimension, source) = calibrated_dimension("engagement");
        let entity = Uuid::new_v4();
        source.insert("engagement", entity, vec![Some(0.02)], 50);

        let composer = ProfileComposer::default();
        let dna = composer
            .categorize(entity, &[Arc::clone(&dimension)], &source)
            .unwrap();

        let vector = dna.membership("engagement").expect("covered dimension");
        let sum: f32 = vector.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() <= 1e-6);
        assert!(!dna.cold_start);
        assert!(dna.confidence > 0.5, "full coverage, tight point");

        // A point at blob 0 must dominantly belong to the segment whose
        // center is near 0 in scaled space.
        let (dominant, weight) = vector.dominant().unwrap();
        let segment = dimension.segment(dominant).unwrap();
        assert!(weight > 0.9);
        assert!(segment.member_count > 0);
        println!("[PASS] test_categorize_produces_valid_memberships - weight={:.3}", weight);
    }

    #[test]
    fn test_uncovered_dimension_is_absent_not_fabricated() {
        let (dimension, source) = calibrated_dimension("spend");
        let stranger = Uuid::new_v4(); // no features anywhere

        let dna = ProfileComposer::default()
            .categorize(stranger, &[dimension], &source)
            .unwrap();

        assert!(dna.membership("spend").is_none());
        assert_eq!(dna.confidence, 0.0);
        assert_eq!(dna.dimension_count(), 0);
    }

    #[test]
    fn test_cold_start_flagged() {
        let (dimension, source) = calibrated_dimension("tier");
        let newcomer = Uuid::new_v4();
        source.insert("tier", newcomer, vec![Some(9.9)], 2); // 2 observations < 10

        let dna = ProfileComposer::default()
            .categorize(newcomer, &[dimension], &source)
            .unwrap();

        assert!(dna.cold_start, "2 observations must be cold start");
        assert!(!dna.is_reliable(0.0), "cold start is never reliable");
        assert!(dna.membership("tier").is_some(), "vector still composed");
    }
}
