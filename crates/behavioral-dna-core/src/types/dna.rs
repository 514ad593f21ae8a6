//! Behavioral DNA: the entity-level fingerprint.
//!
//! A [`BehavioralDna`] collects one entity's fuzzy membership vectors across
//! every calibrated dimension, plus a confidence score and the observation
//! volume behind it. It is immutable once composed; a new observation history
//! produces a new DNA, never an in-place edit.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{MembershipVector, SegmentId};

/// One dimension's slice of an entity's DNA, bound to the explicit
/// dimension version it was projected against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionMembership {
    /// The dimension version id this vector was computed against.
    pub version: Uuid,
    /// Soft membership over the version's leaf segments.
    pub vector: MembershipVector,
}

/// The full behavioral fingerprint of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralDna {
    /// The entity this fingerprint describes.
    pub entity_id: Uuid,

    /// Membership per dimension name. Dimensions where the entity had no
    /// usable features are absent, never fabricated.
    pub memberships: BTreeMap<String, DimensionMembership>,

    /// Aggregate of dimension coverage and mean top-membership strength,
    /// in [0, 1]. Callers must check this before acting on the fingerprint.
    pub confidence: f32,

    /// Raw observations backing this fingerprint, summed across dimensions.
    pub observation_count: usize,

    /// True when the entity had fewer observations than the configured
    /// minimum; the membership vectors are then unreliable by construction.
    pub cold_start: bool,

    /// When this DNA was composed.
    pub computed_at: DateTime<Utc>,
}

impl BehavioralDna {
    /// Membership vector for a dimension, if the entity is covered there.
    pub fn membership(&self, dimension: &str) -> Option<&MembershipVector> {
        self.memberships.get(dimension).map(|m| &m.vector)
    }

    /// Dominant segment per dimension (argmax of each membership vector).
    pub fn dominant_segments(&self) -> BTreeMap<String, SegmentId> {
        self.memberships
            .iter()
            .filter_map(|(name, m)| m.vector.dominant().map(|(id, _)| (name.clone(), id)))
            .collect()
    }

    /// Number of dimensions this entity is covered on.
    #[inline]
    pub fn dimension_count(&self) -> usize {
        self.memberships.len()
    }

    /// Whether this fingerprint is trustworthy enough to act on.
    #[inline]
    pub fn is_reliable(&self, min_confidence: f32) -> bool {
        !self.cold_start && self.confidence >= min_confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MembershipVector;

    fn dna(confidence: f32, cold_start: bool) -> BehavioralDna {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let vector = MembershipVector::from_parts(&[a, b], &[0.8, 0.2]).unwrap();

        let mut memberships = BTreeMap::new();
        memberships.insert(
            "tier".to_string(),
            DimensionMembership {
                version: Uuid::new_v4(),
                vector,
            },
        );

        BehavioralDna {
            entity_id: Uuid::new_v4(),
            memberships,
            confidence,
            observation_count: 42,
            cold_start,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn test_dominant_segments() {
        let dna = dna(0.9, false);
        let dominant = dna.dominant_segments();
        assert_eq!(dominant.len(), 1);
        assert!(dominant.contains_key("tier"));
    }

    #[test]
    fn test_cold_start_is_never_reliable() {
        assert!(dna(0.9, false).is_reliable(0.5));
        assert!(!dna(0.9, true).is_reliable(0.5), "cold start overrides confidence");
        assert!(!dna(0.3, false).is_reliable(0.5));
    }
}
