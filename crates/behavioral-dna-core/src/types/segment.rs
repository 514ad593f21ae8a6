//! Discovered segments within a behavioral dimension.
//!
//! A [`Segment`] is one cluster found at calibration time. Segments form a
//! tree: hierarchical subdivision creates children whose `depth` is strictly
//! greater than their parent's, bounded by the configured maximum depth.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Identifier for a segment within a dimension version.
pub type SegmentId = Uuid;

/// One discovered cluster within a dimension.
///
/// Segments are immutable calibration artifacts. Centers and spread are in
/// scaled-feature units; `population_share` is relative to the dimension's
/// usable population at calibration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Unique id within the dimension version.
    pub id: SegmentId,

    /// Cluster center in scaled-feature space.
    pub center: Vec<f32>,

    /// Mean squared member-to-center distance.
    pub spread: f32,

    /// Maximum member-to-center distance.
    pub max_radius: f32,

    /// Number of members at calibration time.
    pub member_count: usize,

    /// Fraction of the dimension's usable population in this segment.
    pub population_share: f32,

    /// Parent segment, set when created via subdivision.
    pub parent: Option<SegmentId>,

    /// Tree depth; 0 at top level, strictly greater than the parent's.
    pub depth: u8,

    /// Whether this segment is a leaf of the subdivision tree.
    ///
    /// Categorization projects membership over leaf segments only; interior
    /// segments are retained for lineage and diagnostics.
    pub is_leaf: bool,
}

impl Segment {
    /// Validate structural invariants against an optional parent.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Internal` if the depth invariant is violated,
    /// since that indicates a bug in the subdivision engine rather than bad
    /// caller input.
    pub fn validate_against_parent(&self, parent: Option<&Segment>) -> CoreResult<()> {
        match (self.parent, parent) {
            (None, None) => {
                if self.depth != 0 {
                    return Err(CoreError::Internal(format!(
                        "root segment {} has depth {}",
                        self.id, self.depth
                    )));
                }
            }
            (Some(pid), Some(p)) => {
                if pid != p.id {
                    return Err(CoreError::Internal(format!(
                        "segment {} validated against wrong parent {}",
                        self.id, p.id
                    )));
                }
                if self.depth <= p.depth {
                    return Err(CoreError::Internal(format!(
                        "segment {} depth {} not greater than parent depth {}",
                        self.id, self.depth, p.depth
                    )));
                }
            }
            _ => {
                return Err(CoreError::Internal(format!(
                    "segment {} parent reference inconsistent",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(depth: u8, parent: Option<SegmentId>) -> Segment {
        Segment {
            id: Uuid::new_v4(),
            center: vec![0.0, 0.0],
            spread: 0.5,
            max_radius: 1.2,
            member_count: 150,
            population_share: 0.5,
            parent,
            depth,
            is_leaf: true,
        }
    }

    #[test]
    fn test_root_depth_invariant() {
        assert!(segment(0, None).validate_against_parent(None).is_ok());
        assert!(segment(1, None).validate_against_parent(None).is_err());
    }

    #[test]
    fn test_child_depth_strictly_greater() {
        let parent = segment(1, None);
        let mut child = segment(2, Some(parent.id));
        assert!(child.validate_against_parent(Some(&parent)).is_ok());

        child.depth = 1;
        assert!(
            child.validate_against_parent(Some(&parent)).is_err(),
            "equal depth must be rejected"
        );
    }
}
