//! Journey characterization: from snapshot history to a trajectory label.
//!
//! A journey aggregates the pairwise drift between consecutive snapshots of
//! one entity into a qualitative type (stable / evolving / exploratory /
//! regressing), a stability score, and the dimensions most responsible for
//! the movement.
//!
//! Dimension drift across a recalibration boundary is flagged upstream as
//! `dimension_redefined`; such records are excluded from the classification
//! statistics, since a recalibration changes what the segments even mean:
//! the apparent movement may reflect the new taxonomy, not behavior.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

use crate::drift::{BusinessMetrics, DriftAnalyzer, DriftDirection, DriftReport, DriftSeverity};
use crate::error::{CoreError, CoreResult};
use crate::types::Snapshot;

/// Minimum consecutive-pair samples for trend regression.
const MIN_TREND_SAMPLES: usize = 3;

/// Slope magnitude below which the trend is flat.
const TREND_SLOPE_EPSILON: f32 = 0.01;

// =============================================================================
// JourneyConfig
// =============================================================================

/// Thresholds for journey classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JourneyConfig {
    /// Stability score above this classifies the journey stable
    /// (default: 0.8).
    pub stable_min_stability: f32,
    /// Distinct dimensions with significant/major drift needed for an
    /// exploratory journey (default: 3).
    pub exploratory_min_dimensions: usize,
    /// Dimensions that must move while degrading for a pair to count as
    /// regressive (default: 2).
    pub regressing_min_dimensions: usize,
    /// How many dominant dimensions to report (default: 3).
    pub dominant_count: usize,
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            stable_min_stability: 0.8,
            exploratory_min_dimensions: 3,
            regressing_min_dimensions: 2,
            dominant_count: 3,
        }
    }
}

impl JourneyConfig {
    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConfigError` for out-of-range thresholds.
    pub fn validate(&self) -> CoreResult<()> {
        if !(0.0..=1.0).contains(&self.stable_min_stability) {
            return Err(CoreError::ConfigError(format!(
                "stable_min_stability must be in [0, 1], got {}",
                self.stable_min_stability
            )));
        }
        if self.exploratory_min_dimensions == 0 || self.regressing_min_dimensions == 0 {
            return Err(CoreError::ConfigError(
                "dimension thresholds must be > 0".to_string(),
            ));
        }
        if self.dominant_count == 0 {
            return Err(CoreError::ConfigError(
                "dominant_count must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Journey types
// =============================================================================

/// Qualitative trajectory of an entity's behavioral DNA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JourneyType {
    /// Consistently low drift across the whole history.
    Stable,
    /// Ordinary gradual movement.
    Evolving,
    /// Significant or major drift across many distinct dimensions.
    Exploratory,
    /// Degrading direction on multiple dimensions across most pairs.
    Regressing,
}

impl std::fmt::Display for JourneyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JourneyType::Stable => write!(f, "stable"),
            JourneyType::Evolving => write!(f, "evolving"),
            JourneyType::Exploratory => write!(f, "exploratory"),
            JourneyType::Regressing => write!(f, "regressing"),
        }
    }
}

/// Direction the drift magnitudes themselves are heading, via linear
/// regression over consecutive-pair overall drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftTrend {
    /// Drift per pair is shrinking: the entity is settling.
    Improving,
    /// Flat slope, or too few pairs to regress.
    Stable,
    /// Drift per pair is growing.
    Worsening,
}

/// The characterized journey of one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journey {
    /// The entity whose history this summarizes.
    pub entity_id: Uuid,
    /// Qualitative trajectory label.
    pub journey_type: JourneyType,
    /// `1 - mean(overall drift)` across consecutive pairs, in [0, 1].
    pub stability_score: f32,
    /// Dimensions with the highest cumulative drift, strongest first.
    pub dominant_dimensions: Vec<String>,
    /// Whether drift magnitudes are shrinking or growing over the history.
    pub trend: DriftTrend,
    /// Capture time of the first snapshot considered.
    pub first_snapshot: DateTime<Utc>,
    /// Capture time of the last snapshot considered.
    pub last_snapshot: DateTime<Utc>,
    /// Consecutive-pair drift reports, in time order.
    pub drift_records: Vec<DriftReport>,
}

// =============================================================================
// JourneyCharacterizer
// =============================================================================

/// Builds journeys from ordered snapshot histories.
#[derive(Debug, Clone, Default)]
pub struct JourneyCharacterizer {
    config: JourneyConfig,
    analyzer: DriftAnalyzer,
}

impl JourneyCharacterizer {
    /// Create a characterizer with the given thresholds.
    pub fn new(config: JourneyConfig, analyzer: DriftAnalyzer) -> Self {
        Self { config, analyzer }
    }

    /// Characterize an entity's journey from its snapshot history.
    ///
    /// Snapshots are sorted by capture time internally. `metrics`, when
    /// supplied, must hold one entry per snapshot (aligned after sorting is
    /// the caller's responsibility; supply them pre-sorted).
    ///
    /// # Errors
    ///
    /// - `CoreError::InsufficientHistory` for fewer than two snapshots
    /// - `CoreError::EntityMismatch` when snapshots span entities
    /// - `CoreError::ValidationError` when metrics length disagrees
    pub fn characterize(
        &self,
        snapshots: &[Snapshot],
        metrics: Option<&[BusinessMetrics]>,
    ) -> CoreResult<Journey> {
        self.config.validate()?;

        let entity_id = snapshots.first().map(|s| s.entity_id).unwrap_or_default();
        if snapshots.len() < 2 {
            return Err(CoreError::InsufficientHistory {
                entity_id,
                required: 2,
                actual: snapshots.len(),
            });
        }
        for snapshot in snapshots {
            if snapshot.entity_id != entity_id {
                return Err(CoreError::EntityMismatch {
                    left: entity_id,
                    right: snapshot.entity_id,
                });
            }
        }
        if let Some(metrics) = metrics {
            if metrics.len() != snapshots.len() {
                return Err(CoreError::ValidationError {
                    field: "metrics".to_string(),
                    message: format!(
                        "{} metric entries for {} snapshots",
                        metrics.len(),
                        snapshots.len()
                    ),
                });
            }
        }

        let mut ordered: Vec<&Snapshot> = snapshots.iter().collect();
        ordered.sort_by_key(|s| s.captured_at);

        let mut records = Vec::with_capacity(ordered.len() - 1);
        for i in 0..ordered.len() - 1 {
            let pair_metrics = metrics.map(|m| (m[i], m[i + 1]));
            records.push(
                self.analyzer
                    .compare(ordered[i], ordered[i + 1], pair_metrics)?,
            );
        }

        // Classification statistics ignore redefined dimensions.
        let pair_overalls: Vec<f32> = records.iter().map(comparable_overall).collect();
        let stability_score = 1.0
            - pair_overalls.iter().sum::<f32>() / pair_overalls.len() as f32;

        let journey_type = self.classify(&records, stability_score);
        let trend = trend_of(&pair_overalls);
        let dominant_dimensions = self.dominant_dimensions(&records);

        debug!(
            entity = %entity_id,
            %journey_type,
            stability = stability_score,
            pairs = records.len(),
            "journey characterized"
        );

        Ok(Journey {
            entity_id,
            journey_type,
            stability_score,
            dominant_dimensions,
            trend,
            first_snapshot: ordered[0].captured_at,
            last_snapshot: ordered[ordered.len() - 1].captured_at,
            drift_records: records,
        })
    }

    fn classify(&self, records: &[DriftReport], stability_score: f32) -> JourneyType {
        if stability_score > self.config.stable_min_stability {
            return JourneyType::Stable;
        }

        // Regressing: a majority of pairs degrade while moving on enough
        // dimensions.
        let regressive_pairs = records
            .iter()
            .filter(|report| {
                report.direction == Some(DriftDirection::Degrading)
                    && report
                        .dimensions
                        .iter()
                        .filter(|d| !d.dimension_redefined && d.severity >= DriftSeverity::Minor)
                        .count()
                        >= self.config.regressing_min_dimensions
            })
            .count();
        if regressive_pairs * 2 > records.len() {
            return JourneyType::Regressing;
        }

        // Exploratory: significant/major drift on enough distinct
        // dimensions over the whole history.
        let mut turbulent: BTreeSet<&str> = BTreeSet::new();
        for report in records {
            for dimension in &report.dimensions {
                if !dimension.dimension_redefined
                    && dimension.severity >= DriftSeverity::Significant
                {
                    turbulent.insert(dimension.dimension.as_str());
                }
            }
        }
        if turbulent.len() >= self.config.exploratory_min_dimensions {
            return JourneyType::Exploratory;
        }

        JourneyType::Evolving
    }

    /// Dimensions ranked by cumulative drift magnitude across the history.
    fn dominant_dimensions(&self, records: &[DriftReport]) -> Vec<String> {
        let mut cumulative: BTreeMap<&str, f32> = BTreeMap::new();
        for report in records {
            for dimension in &report.dimensions {
                *cumulative.entry(dimension.dimension.as_str()).or_insert(0.0) +=
                    dimension.normalized;
            }
        }

        let mut ranked: Vec<(&str, f32)> = cumulative
            .into_iter()
            .filter(|(_, total)| *total > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
            .into_iter()
            .take(self.config.dominant_count)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

/// Overall drift of one report over its comparable (non-redefined)
/// dimensions; falls back to the raw overall when every dimension was
/// redefined.
fn comparable_overall(report: &DriftReport) -> f32 {
    let comparable: Vec<f32> = report
        .dimensions
        .iter()
        .filter(|d| !d.dimension_redefined)
        .map(|d| d.normalized)
        .collect();
    if comparable.is_empty() {
        report.overall
    } else {
        comparable.iter().sum::<f32>() / comparable.len() as f32
    }
}

/// Least-squares slope of the overall-drift series, bucketed into a trend.
fn trend_of(pair_overalls: &[f32]) -> DriftTrend {
    let n = pair_overalls.len();
    if n < MIN_TREND_SAMPLES {
        return DriftTrend::Stable;
    }

    let mean_x = (n - 1) as f32 / 2.0;
    let mean_y = pair_overalls.iter().sum::<f32>() / n as f32;

    let mut numerator = 0.0f32;
    let mut denominator = 0.0f32;
    for (i, &y) in pair_overalls.iter().enumerate() {
        let dx = i as f32 - mean_x;
        numerator += dx * (y - mean_y);
        denominator += dx * dx;
    }
    if denominator == 0.0 {
        return DriftTrend::Stable;
    }

    let slope = numerator / denominator;
    if slope.abs() < TREND_SLOPE_EPSILON {
        DriftTrend::Stable
    } else if slope > 0.0 {
        DriftTrend::Worsening
    } else {
        DriftTrend::Improving
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeMap;

    use crate::types::{
        BehavioralDna, DimensionMembership, MembershipVector, RetentionClass, SegmentId, Snapshot,
    };

    /// Multi-dimension snapshot builder. `dims` maps name -> (version, ids,
    /// weights).
    fn snapshot(
        entity: Uuid,
        dims: &[(&str, Uuid, &[SegmentId], &[f32])],
        days_ago: i64,
    ) -> Snapshot {
        let mut memberships = BTreeMap::new();
        for (name, version, ids, weights) in dims {
            memberships.insert(
                name.to_string(),
                DimensionMembership {
                    version: *version,
                    vector: MembershipVector::from_parts(ids, weights).unwrap(),
                },
            );
        }
        let captured_at = Utc::now() - Duration::days(days_ago);
        Snapshot {
            id: Uuid::new_v4(),
            entity_id: entity,
            dna: BehavioralDna {
                entity_id: entity,
                memberships,
                confidence: 0.9,
                observation_count: 50,
                cold_start: false,
                computed_at: captured_at,
            },
            captured_at,
            retention: RetentionClass::Daily,
        }
    }

    #[test]
    fn test_quiet_history_is_stable() {
        let entity = Uuid::new_v4();
        let version = Uuid::new_v4();
        let ids = [Uuid::new_v4(), Uuid::new_v4()];

        // Ten snapshots wobbling within a few percent.
        let snapshots: Vec<Snapshot> = (0..10)
            .map(|i| {
                let wobble = (i % 3) as f32 * 0.01;
                snapshot(
                    entity,
                    &[("tier", version, &ids, &[0.7 + wobble, 0.3 - wobble])],
                    (10 - i) as i64,
                )
            })
            .collect();

        let journey = JourneyCharacterizer::default()
            .characterize(&snapshots, None)
            .unwrap();

        assert_eq!(journey.journey_type, JourneyType::Stable);
        assert!(journey.stability_score > 0.8);
        assert_eq!(journey.drift_records.len(), 9);
        println!(
            "[PASS] test_quiet_history_is_stable - stability={:.3}",
            journey.stability_score
        );
    }

    #[test]
    fn test_major_drift_on_many_dimensions_is_exploratory() {
        let entity = Uuid::new_v4();
        let names = ["engagement", "spend", "channel", "timing"];
        let versions: Vec<Uuid> = names.iter().map(|_| Uuid::new_v4()).collect();
        let ids: Vec<[SegmentId; 2]> = names.iter().map(|_| [Uuid::new_v4(), Uuid::new_v4()]).collect();

        // Every dimension fully reverses between consecutive snapshots.
        let mut snapshots = Vec::new();
        for step in 0..4usize {
            let weights: &[f32] = if step % 2 == 0 { &[1.0, 0.0] } else { &[0.0, 1.0] };
            let dims: Vec<(&str, Uuid, &[SegmentId], &[f32])> = names
                .iter()
                .enumerate()
                .map(|(d, name)| (*name, versions[d], &ids[d][..], weights))
                .collect();
            snapshots.push(snapshot(entity, &dims, (4 - step) as i64));
        }

        let journey = JourneyCharacterizer::default()
            .characterize(&snapshots, None)
            .unwrap();

        assert_eq!(journey.journey_type, JourneyType::Exploratory);
        assert_eq!(journey.dominant_dimensions.len(), 3, "top 3 reported");
    }

    #[test]
    fn test_degrading_majority_is_regressing() {
        let entity = Uuid::new_v4();
        let va = Uuid::new_v4();
        let vb = Uuid::new_v4();
        let ids_a = [Uuid::new_v4(), Uuid::new_v4()];
        let ids_b = [Uuid::new_v4(), Uuid::new_v4()];

        // Two dimensions sliding hard every step; metrics worsen throughout.
        let snapshots: Vec<Snapshot> = (0..4)
            .map(|i| {
                let shift = i as f32 * 0.25;
                snapshot(
                    entity,
                    &[
                        ("engagement", va, &ids_a, &[0.9 - shift, 0.1 + shift]),
                        ("spend", vb, &ids_b, &[0.85 - shift, 0.15 + shift]),
                    ],
                    (4 - i) as i64,
                )
            })
            .collect();

        let metrics: Vec<BusinessMetrics> = (0..4)
            .map(|i| BusinessMetrics {
                value: 0.9 - i as f32 * 0.2,
                risk: 0.1 + i as f32 * 0.2,
            })
            .collect();

        let journey = JourneyCharacterizer::default()
            .characterize(&snapshots, Some(&metrics))
            .unwrap();

        assert_eq!(journey.journey_type, JourneyType::Regressing);
    }

    #[test]
    fn test_too_few_snapshots_rejected() {
        let entity = Uuid::new_v4();
        let version = Uuid::new_v4();
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let only = snapshot(entity, &[("tier", version, &ids, &[0.5, 0.5])], 0);

        let result = JourneyCharacterizer::default().characterize(&[only], None);
        assert!(matches!(
            result,
            Err(CoreError::InsufficientHistory { required: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_redefined_dimensions_do_not_drive_classification() {
        let entity = Uuid::new_v4();
        let v1 = Uuid::new_v4();
        let v2 = Uuid::new_v4(); // recalibrated between captures
        let ids = [Uuid::new_v4(), Uuid::new_v4()];

        // Full reversal, but across a version boundary: taxonomy change,
        // not behavior.
        let snapshots = vec![
            snapshot(entity, &[("tier", v1, &ids, &[1.0, 0.0])], 2),
            snapshot(entity, &[("tier", v2, &ids, &[0.0, 1.0])], 1),
            snapshot(entity, &[("tier", v2, &ids, &[0.0, 1.0])], 0),
        ];

        let journey = JourneyCharacterizer::default()
            .characterize(&snapshots, None)
            .unwrap();

        assert_ne!(
            journey.journey_type,
            JourneyType::Exploratory,
            "redefinition must not read as exploration"
        );
        assert!(journey
            .drift_records[0]
            .dimensions[0]
            .dimension_redefined);
    }

    #[test]
    fn test_trend_regression() {
        assert_eq!(trend_of(&[0.1, 0.1]), DriftTrend::Stable, "too few samples");
        assert_eq!(trend_of(&[0.1, 0.3, 0.5, 0.7]), DriftTrend::Worsening);
        assert_eq!(trend_of(&[0.7, 0.5, 0.3, 0.1]), DriftTrend::Improving);
        assert_eq!(trend_of(&[0.4, 0.4, 0.4, 0.4]), DriftTrend::Stable);
    }
}
