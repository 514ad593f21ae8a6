//! Versioned behavioral dimensions.
//!
//! A [`Dimension`] is the immutable artifact produced by one calibration run:
//! the discovered segment tree, the persisted per-feature scalers, quality
//! scores, and the exact configuration the run used. Recalibration never
//! mutates a dimension in place; it produces a new [`DimensionVersion`] that
//! is published atomically, so categorization always binds to one explicit,
//! consistent version.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calibration::CalibrationConfig;
use crate::clustering::QualityWarning;
use crate::error::{CoreError, CoreResult};
use crate::features::FeatureScaler;
use crate::types::{Segment, SegmentId};

/// Identity of one calibration artifact.
///
/// `ordinal` increases by one on every successful recalibration of the same
/// dimension name; `id` is globally unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionVersion {
    /// Globally unique version id.
    pub id: Uuid,
    /// Monotonic version counter per dimension name, starting at 1.
    pub ordinal: u32,
}

impl DimensionVersion {
    /// First version of a dimension.
    pub fn initial() -> Self {
        Self {
            id: Uuid::new_v4(),
            ordinal: 1,
        }
    }

    /// Successor of a previous version.
    pub fn successor(previous: &DimensionVersion) -> Self {
        Self {
            id: Uuid::new_v4(),
            ordinal: previous.ordinal + 1,
        }
    }
}

/// Quality scores recorded at calibration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionQuality {
    /// Cohesion (silhouette) score in [-1, 1] at the selected k.
    pub cohesion: f32,
    /// Population balance score in [0, 1] at the selected k.
    pub balance: f32,
    /// Combined selection score.
    pub combined: f32,
    /// Quality-gate warnings; non-empty marks the dimension low-confidence.
    pub warnings: Vec<QualityWarning>,
}

impl DimensionQuality {
    /// True when no quality gate fired.
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// One immutable, versioned behavioral axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    /// Dimension name, e.g. "engagement_frequency".
    pub name: String,

    /// Version identity of this calibration artifact.
    pub version: DimensionVersion,

    /// Number of features in this dimension's schema.
    pub feature_count: usize,

    /// Per-feature scaler parameters, persisted so categorization applies
    /// the exact transform calibration fitted.
    pub scalers: Vec<FeatureScaler>,

    /// The full segment tree (interior nodes and leaves).
    pub segments: Vec<Segment>,

    /// Quality scores and warnings from model selection.
    pub quality: DimensionQuality,

    /// The configuration this run used, recorded for reproducibility.
    pub calibration: CalibrationConfig,

    /// Usable entities this calibration was fitted on.
    pub population: usize,

    /// Entities excluded for having zero usable features.
    pub excluded_entities: usize,

    /// When the calibration completed.
    pub fitted_at: DateTime<Utc>,
}

impl Dimension {
    /// Leaf segments, in tree order. Membership vectors are defined over
    /// exactly this set.
    pub fn leaves(&self) -> Vec<&Segment> {
        self.segments.iter().filter(|s| s.is_leaf).collect()
    }

    /// Look up a segment by id.
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Direct children of a segment.
    pub fn children_of(&self, id: SegmentId) -> Vec<&Segment> {
        self.segments
            .iter()
            .filter(|s| s.parent == Some(id))
            .collect()
    }

    /// Count of segments per depth level.
    pub fn depth_histogram(&self) -> HashMap<u8, usize> {
        let mut histogram = HashMap::new();
        for segment in &self.segments {
            *histogram.entry(segment.depth).or_insert(0) += 1;
        }
        histogram
    }

    /// Fuzziness exponent this dimension was fitted with; categorization
    /// must project memberships with the same exponent.
    #[inline]
    pub fn fuzziness(&self) -> f32 {
        self.calibration.fuzzy.fuzziness
    }

    /// Verify structural invariants of the segment tree.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Internal` on a dangling parent reference, a depth
    /// inversion, a depth above the configured maximum, or an interior node
    /// without children. These indicate calibration bugs, never bad input.
    pub fn validate_tree(&self) -> CoreResult<()> {
        let by_id: HashMap<SegmentId, &Segment> =
            self.segments.iter().map(|s| (s.id, s)).collect();

        let max_depth = self.calibration.subdivision.max_depth;

        for segment in &self.segments {
            if segment.depth > max_depth {
                return Err(CoreError::Internal(format!(
                    "segment {} at depth {} exceeds max_depth {}",
                    segment.id, segment.depth, max_depth
                )));
            }

            let parent = match segment.parent {
                Some(pid) => Some(*by_id.get(&pid).ok_or_else(|| {
                    CoreError::Internal(format!(
                        "segment {} references missing parent {}",
                        segment.id, pid
                    ))
                })?),
                None => None,
            };
            segment.validate_against_parent(parent)?;

            if !segment.is_leaf && self.children_of(segment.id).is_empty() {
                return Err(CoreError::Internal(format!(
                    "interior segment {} has no children",
                    segment.id
                )));
            }
        }

        if self.leaves().is_empty() {
            return Err(CoreError::Internal(format!(
                "dimension '{}' has no leaf segments",
                self.name
            )));
        }

        Ok(())
    }
}
