//! Hierarchical subdivision of heterogeneous segments.
//!
//! Each discovered segment is inspected for excess heterogeneity and, if
//! warranted, re-clustered as a fresh mini-calibration over just its
//! members. The engine runs an explicit worklist of (member-index-slice,
//! depth) items rather than language-level recursion, so arbitrarily large
//! populations never risk call-stack limits; every item owns only an index
//! slice into the original feature matrix.
//!
//! Termination is structural: each subdivision requires at least
//! `min_segment_size` members, every child keeps `min_subsegment_size`
//! members, and depth is hard-capped. A depth overrun is an invariant
//! violation that aborts calibration.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::features::percentile;
use crate::types::{Segment, SegmentId};

use super::error::ClusterError;
use super::fuzzy::{euclidean, FuzzyFit, FuzzyParams};
use super::selection::{self, SelectionParams};

/// Default maximum subdivision depth.
pub const DEFAULT_MAX_DEPTH: u8 = 3;

/// Default minimum members for a segment to be subdivided at all.
pub const DEFAULT_MIN_SEGMENT_SIZE: usize = 100;

/// Default minimum members for a subdivision child.
pub const DEFAULT_MIN_SUBSEGMENT_SIZE: usize = 30;

// =============================================================================
// SubdivisionConfig
// =============================================================================

/// Parameters governing when and how segments are subdivided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubdivisionConfig {
    /// Hard cap on tree depth; segments at this depth are always leaves.
    pub max_depth: u8,

    /// Size floor: segments below this never subdivide, regardless of other
    /// signals.
    pub min_segment_size: usize,

    /// Every subdivision child must keep at least this many members, or the
    /// parent stays a leaf.
    pub min_subsegment_size: usize,

    /// Variance trigger: mean squared member-to-center distance above this
    /// (in scaled-feature units) marks the segment heterogeneous.
    pub variance_threshold: f32,

    /// Diameter trigger: max member distance above `diameter_factor` times
    /// the 95th-percentile distance marks the segment stretched.
    pub diameter_factor: f32,

    /// Population trigger: a segment holding more than this share of the
    /// dimension's population (and above the size floor) is split.
    pub max_population_share: f32,
}

impl Default for SubdivisionConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            min_segment_size: DEFAULT_MIN_SEGMENT_SIZE,
            min_subsegment_size: DEFAULT_MIN_SUBSEGMENT_SIZE,
            variance_threshold: 2.0,
            diameter_factor: 1.5,
            max_population_share: 0.6,
        }
    }
}

impl SubdivisionConfig {
    /// Set the depth cap.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u8) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the size floor.
    #[must_use]
    pub fn with_min_segment_size(mut self, size: usize) -> Self {
        self.min_segment_size = size;
        self
    }

    /// Set the minimum child size.
    #[must_use]
    pub fn with_min_subsegment_size(mut self, size: usize) -> Self {
        self.min_subsegment_size = size;
        self
    }

    /// Set the variance trigger threshold.
    #[must_use]
    pub fn with_variance_threshold(mut self, threshold: f32) -> Self {
        self.variance_threshold = threshold;
        self
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::InvalidParameter` if sizes are degenerate or
    /// thresholds non-positive.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.min_subsegment_size < 2 {
            return Err(ClusterError::invalid_parameter(format!(
                "min_subsegment_size must be >= 2, got {}",
                self.min_subsegment_size
            )));
        }
        if self.min_segment_size < self.min_subsegment_size {
            return Err(ClusterError::invalid_parameter(format!(
                "min_segment_size ({}) must be >= min_subsegment_size ({})",
                self.min_segment_size, self.min_subsegment_size
            )));
        }
        if self.variance_threshold <= 0.0 {
            return Err(ClusterError::invalid_parameter(format!(
                "variance_threshold must be > 0, got {}",
                self.variance_threshold
            )));
        }
        if self.diameter_factor <= 0.0 {
            return Err(ClusterError::invalid_parameter(format!(
                "diameter_factor must be > 0, got {}",
                self.diameter_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.max_population_share) || self.max_population_share == 0.0 {
            return Err(ClusterError::invalid_parameter(format!(
                "max_population_share must be in (0, 1], got {}",
                self.max_population_share
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Engine
// =============================================================================

/// One pending mini-calibration: an index slice and its position in the tree.
struct WorkItem {
    /// Index of the segment in the output vector.
    segment_index: usize,
    /// Member row indices into the original matrix.
    indices: Vec<usize>,
    /// Depth of the segment (children are depth + 1).
    depth: u8,
}

/// Grow the full segment tree from a top-level fit.
///
/// `rows` is the dimension's scaled feature matrix; `fit` the winning
/// top-level clustering; `selection_params` the candidate range reused for
/// mini-calibrations (clamped per slice so children can satisfy the size
/// floor).
///
/// Returns the flattened tree: top-level segments first, children appended
/// in discovery order. Leaves are marked; parents keep lineage.
///
/// # Errors
///
/// - `ClusterError::DepthExceeded` if a work item ever lands past the cap
///   (an engine bug; calibration must abort rather than publish)
/// - any mini-calibration error
pub fn subdivide(
    rows: &[Vec<f32>],
    fit: &FuzzyFit,
    selection_params: &SelectionParams,
    fuzzy_params: &FuzzyParams,
    config: &SubdivisionConfig,
) -> Result<Vec<Segment>, ClusterError> {
    config.validate()?;

    let total = rows.len();
    let labels = fit.hard_labels();

    let mut segments: Vec<Segment> = Vec::new();
    let mut worklist: Vec<WorkItem> = Vec::new();

    for (j, center) in fit.centers.iter().enumerate() {
        let indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == j)
            .map(|(i, _)| i)
            .collect();

        let segment = build_segment(rows, &indices, center.clone(), total, None, 0);
        worklist.push(WorkItem {
            segment_index: segments.len(),
            indices,
            depth: 0,
        });
        segments.push(segment);
    }

    while let Some(item) = worklist.pop() {
        if item.depth > config.max_depth {
            return Err(ClusterError::DepthExceeded {
                depth: item.depth,
                max_depth: config.max_depth,
            });
        }
        if item.depth == config.max_depth {
            continue; // depth cap: stays a leaf
        }

        let parent = &segments[item.segment_index];
        if !should_subdivide(rows, &item.indices, parent, config) {
            continue;
        }

        // Mini-calibration over just this slice. The candidate range is
        // clamped so every child can clear the subsegment floor.
        let slice: Vec<Vec<f32>> = item.indices.iter().map(|&i| rows[i].clone()).collect();
        let child_k_max = selection_params
            .k_max
            .min(item.indices.len() / config.min_subsegment_size);
        if child_k_max < selection_params.k_min {
            continue;
        }

        let child_params = SelectionParams {
            k_max: child_k_max,
            ..selection_params.clone()
        };
        let selection = selection::select_k(&slice, &child_params, fuzzy_params)?;
        let child_labels = selection.fit.hard_labels();
        let child_sizes = selection.fit.cluster_sizes();

        if child_sizes.iter().any(|&s| s < config.min_subsegment_size) {
            debug!(
                parent = %parent.id,
                ?child_sizes,
                floor = config.min_subsegment_size,
                "discarding subdivision: child below subsegment floor"
            );
            continue; // parent stays a leaf
        }

        let parent_id = parent.id;
        let child_depth = item.depth + 1;
        segments[item.segment_index].is_leaf = false;

        for (j, center) in selection.fit.centers.iter().enumerate() {
            let child_indices: Vec<usize> = child_labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == j)
                .map(|(local, _)| item.indices[local])
                .collect();

            let child = build_segment(
                rows,
                &child_indices,
                center.clone(),
                total,
                Some(parent_id),
                child_depth,
            );
            worklist.push(WorkItem {
                segment_index: segments.len(),
                indices: child_indices,
                depth: child_depth,
            });
            segments.push(child);
        }
    }

    Ok(segments)
}

/// Evaluate the subdivision triggers for one segment.
///
/// The size floor overrides everything; otherwise any single trigger
/// suffices.
fn should_subdivide(
    rows: &[Vec<f32>],
    indices: &[usize],
    segment: &Segment,
    config: &SubdivisionConfig,
) -> bool {
    if indices.len() < config.min_segment_size {
        return false;
    }

    let distances: Vec<f32> = indices
        .iter()
        .map(|&i| euclidean(&rows[i], &segment.center))
        .collect();

    let variance_trigger = segment.spread > config.variance_threshold;

    let p95 = percentile(&distances, 0.95);
    let diameter_trigger = p95 > 0.0 && segment.max_radius > config.diameter_factor * p95;

    let population_trigger = segment.population_share > config.max_population_share
        && indices.len() > config.min_segment_size;

    if variance_trigger || diameter_trigger || population_trigger {
        debug!(
            segment = %segment.id,
            variance_trigger,
            diameter_trigger,
            population_trigger,
            members = indices.len(),
            "subdivision triggered"
        );
        true
    } else {
        false
    }
}

/// Materialize a segment from its member indices and fitted center.
fn build_segment(
    rows: &[Vec<f32>],
    indices: &[usize],
    center: Vec<f32>,
    total_population: usize,
    parent: Option<SegmentId>,
    depth: u8,
) -> Segment {
    let mut spread = 0.0f32;
    let mut max_radius = 0.0f32;
    for &i in indices {
        let distance = euclidean(&rows[i], &center);
        spread += distance * distance;
        max_radius = max_radius.max(distance);
    }
    if !indices.is_empty() {
        spread /= indices.len() as f32;
    }

    Segment {
        id: Uuid::new_v4(),
        center,
        spread,
        max_radius,
        member_count: indices.len(),
        population_share: if total_population > 0 {
            indices.len() as f32 / total_population as f32
        } else {
            0.0
        },
        parent,
        depth,
        is_leaf: true,
    }
}
