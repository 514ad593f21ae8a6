//! Timestamped behavioral DNA captures.
//!
//! A [`Snapshot`] is an immutable capture of one entity's DNA at a point in
//! time, tagged with the [`RetentionClass`] that governs how long the store
//! keeps it. Expiry itself is caller policy; the core only carries the tag.
//!
//! [`SnapshotRecord`] is the one concrete persistence shape this crate
//! commits to: `{entity_id, dimension_name -> {segment_id -> membership},
//! timestamp, confidence, observation_count}`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{BehavioralDna, SegmentId};

/// Retention class governing how long a snapshot is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionClass {
    /// Kept on a daily cadence, shortest retention.
    #[default]
    Daily,
    /// Kept on a weekly cadence.
    Weekly,
    /// Kept on a monthly cadence.
    Monthly,
    /// Kept on a quarterly cadence.
    Quarterly,
    /// Kept on a yearly cadence, longest retention.
    Yearly,
}

impl std::fmt::Display for RetentionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetentionClass::Daily => write!(f, "daily"),
            RetentionClass::Weekly => write!(f, "weekly"),
            RetentionClass::Monthly => write!(f, "monthly"),
            RetentionClass::Quarterly => write!(f, "quarterly"),
            RetentionClass::Yearly => write!(f, "yearly"),
        }
    }
}

/// An immutable, timestamped capture of one entity's behavioral DNA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique snapshot id.
    pub id: Uuid,

    /// The entity captured. Always equals `dna.entity_id`.
    pub entity_id: Uuid,

    /// The captured fingerprint.
    pub dna: BehavioralDna,

    /// Capture time. Duplicate captures for the same entity/timestamp are
    /// tolerated; drift analysis uses the latest two in a window.
    pub captured_at: DateTime<Utc>,

    /// Retention class supplied by the capture scheduler.
    pub retention: RetentionClass,
}

impl Snapshot {
    /// Capture a DNA now.
    pub fn capture(dna: BehavioralDna, retention: RetentionClass) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id: dna.entity_id,
            captured_at: Utc::now(),
            dna,
            retention,
        }
    }

    /// Flatten to the persistence wire shape.
    pub fn to_record(&self) -> SnapshotRecord {
        SnapshotRecord {
            entity_id: self.entity_id,
            dimensions: self
                .dna
                .memberships
                .iter()
                .map(|(name, m)| (name.clone(), m.vector.as_map().clone()))
                .collect(),
            timestamp: self.captured_at,
            confidence: self.dna.confidence,
            observation_count: self.dna.observation_count,
        }
    }
}

/// The concrete persistence format contract for stored snapshots.
///
/// Membership floats for one dimension sum to 1.0 within 1e-6; that
/// invariant is enforced upstream by [`crate::types::MembershipVector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// The captured entity.
    pub entity_id: Uuid,
    /// Per-dimension membership maps.
    pub dimensions: BTreeMap<String, BTreeMap<SegmentId, f32>>,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Confidence of the captured DNA.
    pub confidence: f32,
    /// Observations backing the captured DNA.
    pub observation_count: usize,
}
