//! Fuzzy membership vectors.
//!
//! A [`MembershipVector`] maps segment ids to soft membership weights for one
//! entity on one dimension. Weights are probability-like: each lies in
//! [0, 1] and the whole vector sums to 1 within [`MEMBERSHIP_SUM_TOLERANCE`].
//!
//! Construction is fail-fast: a vector that does not satisfy the sum
//! invariant, or that carries NaN/Infinity, is rejected rather than
//! normalized silently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::SegmentId;

/// Tolerance for the sum-to-one invariant.
pub const MEMBERSHIP_SUM_TOLERANCE: f32 = 1e-6;

/// Soft membership of one entity over one dimension's leaf segments.
///
/// # Example
///
/// ```
/// use behavioral_dna_core::types::MembershipVector;
/// use std::collections::BTreeMap;
/// use uuid::Uuid;
///
/// let a = Uuid::new_v4();
/// let b = Uuid::new_v4();
/// let mut weights = BTreeMap::new();
/// weights.insert(a, 0.7);
/// weights.insert(b, 0.3);
///
/// let vector = MembershipVector::new(weights).unwrap();
/// assert_eq!(vector.dominant().map(|(id, _)| id), Some(a));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipVector {
    weights: BTreeMap<SegmentId, f32>,
}

impl MembershipVector {
    /// Create a membership vector, enforcing the sum-to-one invariant.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ValidationError` if:
    /// - the map is empty
    /// - any weight is NaN, infinite, or outside [0, 1]
    /// - the weights do not sum to 1.0 within `MEMBERSHIP_SUM_TOLERANCE`
    pub fn new(weights: BTreeMap<SegmentId, f32>) -> CoreResult<Self> {
        if weights.is_empty() {
            return Err(CoreError::ValidationError {
                field: "weights".to_string(),
                message: "membership vector must cover at least one segment".to_string(),
            });
        }

        let mut sum = 0.0f32;
        for (id, &w) in &weights {
            if !w.is_finite() {
                return Err(CoreError::ValidationError {
                    field: "weights".to_string(),
                    message: format!("non-finite membership {} for segment {}", w, id),
                });
            }
            if !(0.0..=1.0).contains(&w) {
                return Err(CoreError::ValidationError {
                    field: "weights".to_string(),
                    message: format!("membership {} for segment {} outside [0, 1]", w, id),
                });
            }
            sum += w;
        }

        if (sum - 1.0).abs() > MEMBERSHIP_SUM_TOLERANCE {
            return Err(CoreError::ValidationError {
                field: "weights".to_string(),
                message: format!("memberships sum to {}, expected 1.0 +/- 1e-6", sum),
            });
        }

        Ok(Self { weights })
    }

    /// Build from parallel id/weight slices produced by the clusterer.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ValidationError` under the same rules as [`new`],
    /// or if the slices differ in length.
    ///
    /// [`new`]: MembershipVector::new
    pub fn from_parts(ids: &[SegmentId], weights: &[f32]) -> CoreResult<Self> {
        if ids.len() != weights.len() {
            return Err(CoreError::ValidationError {
                field: "weights".to_string(),
                message: format!("{} segment ids but {} weights", ids.len(), weights.len()),
            });
        }
        Self::new(ids.iter().copied().zip(weights.iter().copied()).collect())
    }

    /// Membership for a segment; 0.0 for segments not in this vector.
    #[inline]
    pub fn get(&self, id: SegmentId) -> f32 {
        self.weights.get(&id).copied().unwrap_or(0.0)
    }

    /// Number of segments covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True if no segments are covered (never the case for validated vectors).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// The segment with the highest membership and its weight.
    pub fn dominant(&self) -> Option<(SegmentId, f32)> {
        self.weights
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(&id, &w)| (id, w))
    }

    /// Shannon entropy of the membership distribution, in nats.
    ///
    /// 0.0 for a hard assignment; ln(k) for a uniform spread over k segments.
    pub fn entropy(&self) -> f32 {
        self.weights
            .values()
            .filter(|&&w| w > 0.0)
            .map(|&w| -w * w.ln())
            .sum()
    }

    /// Iterate over (segment id, weight) pairs in segment-id order.
    pub fn iter(&self) -> impl Iterator<Item = (SegmentId, f32)> + '_ {
        self.weights.iter().map(|(&id, &w)| (id, w))
    }

    /// All segment ids covered by this vector.
    pub fn segment_ids(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.weights.keys().copied()
    }

    /// Borrow the underlying map (used for the snapshot wire record).
    pub fn as_map(&self) -> &BTreeMap<SegmentId, f32> {
        &self.weights
    }
}
