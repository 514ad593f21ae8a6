//! Drift analysis between behavioral DNA snapshots.
//!
//! Drift is computed on demand from a pair of snapshots, never stored as
//! mutable state. For every dimension present in both snapshots the
//! analyzer takes the Euclidean distance between the two membership vectors
//! (missing segments count as membership 0), normalizes by the maximum
//! possible distance sqrt(2), achieved by a complete reversal such as
//! [1,0] -> [0,1],
//! and classifies the result into severity and urgency tiers.
//!
//! The analyzer has no opinion on which direction is "good": improvement or
//! degradation is derived only when the caller supplies comparable business
//! metrics for both capture times.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::{SegmentId, Snapshot};

/// Maximum possible Euclidean distance between two membership vectors.
pub const MAX_MEMBERSHIP_DISTANCE: f32 = std::f32::consts::SQRT_2;

/// Seconds per day, for velocity.
const SECONDS_PER_DAY: f32 = 86_400.0;

// =============================================================================
// DriftConfig
// =============================================================================

/// Thresholds for drift classification.
///
/// Severity bounds are upper bounds on normalized drift, strictly
/// increasing; velocity bounds are per-day urgency cutoffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Normalized drift below this is stable (default: 0.1).
    pub stable_max: f32,
    /// Below this, minor (default: 0.3).
    pub minor_max: f32,
    /// Below this, moderate (default: 0.5).
    pub moderate_max: f32,
    /// Below this, significant; at or above, major (default: 0.7).
    pub significant_max: f32,
    /// Velocity above this flags high urgency (default: 0.005/day).
    pub high_velocity: f32,
    /// Velocity above this flags urgent (default: 0.01/day).
    pub urgent_velocity: f32,
    /// Net business-metric change within this is directionally stable
    /// (default: 0.01).
    pub direction_epsilon: f32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            stable_max: 0.1,
            minor_max: 0.3,
            moderate_max: 0.5,
            significant_max: 0.7,
            high_velocity: 0.005,
            urgent_velocity: 0.01,
            direction_epsilon: 0.01,
        }
    }
}

impl DriftConfig {
    /// Validate that thresholds are properly ordered.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConfigError` unless
    /// `0 < stable < minor < moderate < significant <= 1` and
    /// `0 < high_velocity < urgent_velocity`.
    pub fn validate(&self) -> CoreResult<()> {
        let ordered = 0.0 < self.stable_max
            && self.stable_max < self.minor_max
            && self.minor_max < self.moderate_max
            && self.moderate_max < self.significant_max
            && self.significant_max <= 1.0;
        if !ordered {
            return Err(CoreError::ConfigError(format!(
                "severity thresholds must satisfy 0 < stable ({}) < minor ({}) < moderate ({}) < significant ({}) <= 1",
                self.stable_max, self.minor_max, self.moderate_max, self.significant_max
            )));
        }
        if !(0.0 < self.high_velocity && self.high_velocity < self.urgent_velocity) {
            return Err(CoreError::ConfigError(format!(
                "velocity thresholds must satisfy 0 < high ({}) < urgent ({})",
                self.high_velocity, self.urgent_velocity
            )));
        }
        if self.direction_epsilon < 0.0 {
            return Err(CoreError::ConfigError(format!(
                "direction_epsilon must be >= 0, got {}",
                self.direction_epsilon
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Classification enums
// =============================================================================

/// Severity tiers for normalized drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    /// Normalized drift below `stable_max`.
    Stable,
    /// Below `minor_max`.
    Minor,
    /// Below `moderate_max`.
    Moderate,
    /// Below `significant_max`.
    Significant,
    /// At or above `significant_max`.
    Major,
}

impl DriftSeverity {
    /// Classify a normalized drift value.
    pub fn from_normalized(drift: f32, config: &DriftConfig) -> Self {
        if drift < config.stable_max {
            DriftSeverity::Stable
        } else if drift < config.minor_max {
            DriftSeverity::Minor
        } else if drift < config.moderate_max {
            DriftSeverity::Moderate
        } else if drift < config.significant_max {
            DriftSeverity::Significant
        } else {
            DriftSeverity::Major
        }
    }

    /// Whether this tier indicates notable movement.
    #[inline]
    pub fn is_notable(self) -> bool {
        self >= DriftSeverity::Moderate
    }
}

impl std::fmt::Display for DriftSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftSeverity::Stable => write!(f, "stable"),
            DriftSeverity::Minor => write!(f, "minor"),
            DriftSeverity::Moderate => write!(f, "moderate"),
            DriftSeverity::Significant => write!(f, "significant"),
            DriftSeverity::Major => write!(f, "major"),
        }
    }
}

/// Urgency tiers for drift velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftUrgency {
    /// Velocity at or below `high_velocity`.
    Normal,
    /// Above `high_velocity`.
    High,
    /// Above `urgent_velocity`.
    Urgent,
}

impl DriftUrgency {
    /// Classify a per-day velocity.
    pub fn from_velocity(velocity: f32, config: &DriftConfig) -> Self {
        if velocity > config.urgent_velocity {
            DriftUrgency::Urgent
        } else if velocity > config.high_velocity {
            DriftUrgency::High
        } else {
            DriftUrgency::Normal
        }
    }
}

/// Direction of movement, judged by caller-supplied business metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftDirection {
    /// Net value/risk change is positive.
    Improving,
    /// Net change within epsilon of zero.
    Stable,
    /// Net value/risk change is negative.
    Degrading,
}

/// Comparable business metrics at one capture time.
///
/// The clustering itself carries no notion of good or bad; callers supply
/// these to get a direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusinessMetrics {
    /// A value score (higher is better).
    pub value: f32,
    /// A risk score (higher is worse).
    pub risk: f32,
}

impl BusinessMetrics {
    /// Judge the direction of movement between two metric captures.
    pub fn direction(from: &BusinessMetrics, to: &BusinessMetrics, epsilon: f32) -> DriftDirection {
        let net = (to.value - from.value) - (to.risk - from.risk);
        if net.abs() <= epsilon {
            DriftDirection::Stable
        } else if net > 0.0 {
            DriftDirection::Improving
        } else {
            DriftDirection::Degrading
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Drift of one dimension between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDrift {
    /// Dimension name.
    pub dimension: String,
    /// Per-segment membership delta (later minus earlier) over the union of
    /// segment ids; missing segments count as 0.
    pub deltas: BTreeMap<SegmentId, f32>,
    /// Euclidean length of the delta vector.
    pub magnitude: f32,
    /// Magnitude normalized by sqrt(2), in [0, 1].
    pub normalized: f32,
    /// Severity tier of the normalized drift.
    pub severity: DriftSeverity,
    /// Normalized drift per elapsed day; 0 when the snapshots share a
    /// timestamp.
    pub velocity_per_day: f32,
    /// Urgency tier of the velocity.
    pub urgency: DriftUrgency,
    /// True when the two snapshots carry different dimension versions; the
    /// movement may reflect a new taxonomy, not behavioral drift.
    pub dimension_redefined: bool,
}

/// Full drift report between two snapshots of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// The entity both snapshots describe.
    pub entity_id: Uuid,
    /// Capture time of the earlier snapshot.
    pub from: chrono::DateTime<chrono::Utc>,
    /// Capture time of the later snapshot.
    pub to: chrono::DateTime<chrono::Utc>,
    /// Elapsed time in days (fractional).
    pub elapsed_days: f32,
    /// Per-dimension drift for dimensions present in both snapshots.
    pub dimensions: Vec<DimensionDrift>,
    /// Mean normalized drift across dimensions; 0 when none are shared.
    pub overall: f32,
    /// Severity tier of the overall drift.
    pub overall_severity: DriftSeverity,
    /// Direction, when the caller supplied business metrics.
    pub direction: Option<DriftDirection>,
}

impl DriftReport {
    /// Dimensions at or above a severity tier.
    pub fn dimensions_at_least(&self, severity: DriftSeverity) -> Vec<&DimensionDrift> {
        self.dimensions
            .iter()
            .filter(|d| d.severity >= severity)
            .collect()
    }
}

// =============================================================================
// DriftAnalyzer
// =============================================================================

/// Computes drift reports from snapshot pairs.
#[derive(Debug, Clone, Default)]
pub struct DriftAnalyzer {
    config: DriftConfig,
}

impl DriftAnalyzer {
    /// Create an analyzer with the given thresholds.
    pub fn new(config: DriftConfig) -> Self {
        Self { config }
    }

    /// The thresholds this analyzer classifies with.
    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Compare two snapshots of the same entity.
    ///
    /// Order-insensitive: the snapshots are sorted by capture time
    /// internally, so `compare(a, b)` and `compare(b, a)` produce the same
    /// report. Metrics, when supplied, are `(at_from, at_to)` in the sorted
    /// order.
    ///
    /// # Errors
    ///
    /// - `CoreError::EntityMismatch` when the snapshots describe different
    ///   entities
    /// - `CoreError::ConfigError` for invalid thresholds
    pub fn compare(
        &self,
        a: &Snapshot,
        b: &Snapshot,
        metrics: Option<(BusinessMetrics, BusinessMetrics)>,
    ) -> CoreResult<DriftReport> {
        self.config.validate()?;

        if a.entity_id != b.entity_id {
            return Err(CoreError::EntityMismatch {
                left: a.entity_id,
                right: b.entity_id,
            });
        }

        let (earlier, later) = if a.captured_at <= b.captured_at {
            (a, b)
        } else {
            (b, a)
        };
        let elapsed_days =
            (later.captured_at - earlier.captured_at).num_seconds() as f32 / SECONDS_PER_DAY;

        let mut dimensions = Vec::new();
        for (name, earlier_membership) in &earlier.dna.memberships {
            let Some(later_membership) = later.dna.memberships.get(name) else {
                continue; // only dimensions present in both
            };

            let ids: BTreeSet<SegmentId> = earlier_membership
                .vector
                .segment_ids()
                .chain(later_membership.vector.segment_ids())
                .collect();

            let mut deltas = BTreeMap::new();
            let mut sum_squared = 0.0f32;
            for id in ids {
                let delta = later_membership.vector.get(id) - earlier_membership.vector.get(id);
                sum_squared += delta * delta;
                deltas.insert(id, delta);
            }

            let magnitude = sum_squared.sqrt();
            let normalized = (magnitude / MAX_MEMBERSHIP_DISTANCE).min(1.0);
            let velocity_per_day = if elapsed_days > 0.0 {
                normalized / elapsed_days
            } else {
                0.0
            };

            dimensions.push(DimensionDrift {
                dimension: name.clone(),
                deltas,
                magnitude,
                normalized,
                severity: DriftSeverity::from_normalized(normalized, &self.config),
                velocity_per_day,
                urgency: DriftUrgency::from_velocity(velocity_per_day, &self.config),
                dimension_redefined: earlier_membership.version != later_membership.version,
            });
        }

        let overall = if dimensions.is_empty() {
            0.0
        } else {
            dimensions.iter().map(|d| d.normalized).sum::<f32>() / dimensions.len() as f32
        };

        let direction = metrics
            .map(|(from, to)| BusinessMetrics::direction(&from, &to, self.config.direction_epsilon));

        debug!(
            entity = %earlier.entity_id,
            elapsed_days,
            overall,
            dimensions = dimensions.len(),
            "drift computed"
        );

        Ok(DriftReport {
            entity_id: earlier.entity_id,
            from: earlier.captured_at,
            to: later.captured_at,
            elapsed_days,
            dimensions,
            overall,
            overall_severity: DriftSeverity::from_normalized(overall, &self.config),
            direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;

    use crate::types::{
        BehavioralDna, DimensionMembership, MembershipVector, RetentionClass, Snapshot,
    };

    /// Snapshot with one dimension over the given segment ids and weights.
    fn snapshot(
        entity: Uuid,
        version: Uuid,
        ids: &[SegmentId],
        weights: &[f32],
        days_ago: i64,
    ) -> Snapshot {
        let vector = MembershipVector::from_parts(ids, weights).unwrap();
        let mut memberships = BTreeMap::new();
        memberships.insert("tier".to_string(), DimensionMembership { version, vector });

        let captured_at = Utc::now() - Duration::days(days_ago);
        Snapshot {
            id: Uuid::new_v4(),
            entity_id: entity,
            dna: BehavioralDna {
                entity_id: entity,
                memberships,
                confidence: 0.9,
                observation_count: 100,
                cold_start: false,
                computed_at: captured_at,
            },
            captured_at,
            retention: RetentionClass::Daily,
        }
    }

    #[test]
    fn test_drift_against_self_is_zero() {
        let entity = Uuid::new_v4();
        let version = Uuid::new_v4();
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let snap = snapshot(entity, version, &ids, &[0.7, 0.3], 0);

        let report = DriftAnalyzer::default().compare(&snap, &snap, None).unwrap();
        assert_eq!(report.overall, 0.0);
        for dimension in &report.dimensions {
            assert_eq!(dimension.normalized, 0.0);
            assert_eq!(dimension.severity, DriftSeverity::Stable);
            assert_eq!(dimension.velocity_per_day, 0.0);
        }
    }

    #[test]
    fn test_drift_is_symmetric() {
        let entity = Uuid::new_v4();
        let version = Uuid::new_v4();
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let t0 = snapshot(entity, version, &ids, &[0.9, 0.1], 30);
        let t1 = snapshot(entity, version, &ids, &[0.4, 0.6], 0);

        let analyzer = DriftAnalyzer::default();
        let forward = analyzer.compare(&t0, &t1, None).unwrap();
        let backward = analyzer.compare(&t1, &t0, None).unwrap();

        assert_eq!(forward.overall, backward.overall);
        assert_eq!(forward.from, backward.from, "internally time-ordered");
        assert_eq!(forward.elapsed_days, backward.elapsed_days);
    }

    #[test]
    fn test_complete_reversal_is_exactly_one() {
        let entity = Uuid::new_v4();
        let version = Uuid::new_v4();
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let t0 = snapshot(entity, version, &ids, &[1.0, 0.0], 10);
        let t1 = snapshot(entity, version, &ids, &[0.0, 1.0], 0);

        let report = DriftAnalyzer::default().compare(&t0, &t1, None).unwrap();
        let drift = &report.dimensions[0];
        assert!(
            (drift.normalized - 1.0).abs() < 1e-6,
            "complete reversal must normalize to exactly 1.0, got {}",
            drift.normalized
        );
        assert_eq!(drift.severity, DriftSeverity::Major);
        println!("[PASS] test_complete_reversal_is_exactly_one");
    }

    #[test]
    fn test_missing_segments_count_as_zero() {
        let entity = Uuid::new_v4();
        let version_a = Uuid::new_v4();
        let version_b = Uuid::new_v4();
        let shared = Uuid::new_v4();
        let only_old = Uuid::new_v4();
        let only_new = Uuid::new_v4();

        let t0 = snapshot(entity, version_a, &[shared, only_old], &[0.5, 0.5], 10);
        let t1 = snapshot(entity, version_b, &[shared, only_new], &[0.5, 0.5], 0);

        let report = DriftAnalyzer::default().compare(&t0, &t1, None).unwrap();
        let drift = &report.dimensions[0];

        // Union covers three segments: shared (delta 0), old (-0.5), new (+0.5)
        assert_eq!(drift.deltas.len(), 3);
        assert_eq!(drift.deltas[&shared], 0.0);
        assert_eq!(drift.deltas[&only_old], -0.5);
        assert_eq!(drift.deltas[&only_new], 0.5);
        assert!(drift.dimension_redefined, "version change must be flagged");
    }

    #[test]
    fn test_ninety_day_shift_classification() {
        // [0.9, 0.1] -> [0.1, 0.9] over 90 days: delta 0.8 per segment,
        // magnitude 0.8 * sqrt(2), normalized 0.8.
        let entity = Uuid::new_v4();
        let version = Uuid::new_v4();
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let t0 = snapshot(entity, version, &ids, &[0.9, 0.1], 90);
        let t1 = snapshot(entity, version, &ids, &[0.1, 0.9], 0);

        let report = DriftAnalyzer::default().compare(&t0, &t1, None).unwrap();
        let drift = &report.dimensions[0];

        assert!((drift.magnitude - 0.8 * MAX_MEMBERSHIP_DISTANCE).abs() < 1e-4);
        assert!((drift.normalized - 0.8).abs() < 1e-4);
        assert_eq!(drift.severity, DriftSeverity::Major);

        // 0.8 / 90 days ~ 0.0089/day: above high, below urgent.
        assert!((drift.velocity_per_day - 0.8 / 90.0).abs() < 1e-4);
        assert_eq!(drift.urgency, DriftUrgency::High);
        println!(
            "[PASS] test_ninety_day_shift_classification - normalized={:.3}, velocity={:.5}",
            drift.normalized, drift.velocity_per_day
        );
    }

    #[test]
    fn test_direction_requires_metrics() {
        let entity = Uuid::new_v4();
        let version = Uuid::new_v4();
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let t0 = snapshot(entity, version, &ids, &[0.9, 0.1], 10);
        let t1 = snapshot(entity, version, &ids, &[0.5, 0.5], 0);

        let analyzer = DriftAnalyzer::default();
        let silent = analyzer.compare(&t0, &t1, None).unwrap();
        assert!(silent.direction.is_none(), "no metrics, no opinion");

        let worse = (
            BusinessMetrics { value: 0.8, risk: 0.2 },
            BusinessMetrics { value: 0.5, risk: 0.4 },
        );
        let judged = analyzer.compare(&t0, &t1, Some(worse)).unwrap();
        assert_eq!(judged.direction, Some(DriftDirection::Degrading));

        let flat = (
            BusinessMetrics { value: 0.8, risk: 0.2 },
            BusinessMetrics { value: 0.8, risk: 0.2 },
        );
        let judged = analyzer.compare(&t0, &t1, Some(flat)).unwrap();
        assert_eq!(judged.direction, Some(DriftDirection::Stable));
    }

    #[test]
    fn test_entity_mismatch_rejected() {
        let version = Uuid::new_v4();
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let a = snapshot(Uuid::new_v4(), version, &ids, &[0.5, 0.5], 1);
        let b = snapshot(Uuid::new_v4(), version, &ids, &[0.5, 0.5], 0);

        assert!(matches!(
            DriftAnalyzer::default().compare(&a, &b, None),
            Err(CoreError::EntityMismatch { .. })
        ));
    }

    #[test]
    fn test_config_ordering_validated() {
        let mut config = DriftConfig::default();
        config.minor_max = 0.05; // below stable_max
        assert!(config.validate().is_err());

        let mut config = DriftConfig::default();
        config.urgent_velocity = 0.001; // below high_velocity
        assert!(config.validate().is_err());
    }
}
