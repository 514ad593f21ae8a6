//! Balance-aware model selection.
//!
//! Chooses the segment count for a dimension by scoring every candidate k
//! in the configured range on two axes:
//!
//! - **cohesion**: simplified silhouette over hard assignments, in [-1, 1]
//! - **balance**: `1 - min(1, coefficient_of_variation(sizes))`, in [0, 1]
//!
//! The combined score weights balance above cohesion (0.6 vs 0.4 by
//! default): pure cohesion optimization collapses to one dominant cluster
//! plus noise, which scores well statistically and is useless
//! operationally. Quality gates at the selected k emit warnings, never hard
//! failures; callers may mark the dimension low-confidence.
//!
//! # Example
//!
//! ```
//! use behavioral_dna_core::clustering::SelectionParams;
//!
//! let params = SelectionParams::default().with_k_range(2, 5);
//! assert_eq!(params.balance_weight, 0.6);
//! assert!(params.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::features::{mean, std_dev};

use super::error::ClusterError;
use super::fuzzy::{self, euclidean, FuzzyFit, FuzzyParams};

/// Tolerance for the weight-sum check in [`SelectionParams::validate`].
const WEIGHT_SUM_TOLERANCE: f32 = 1e-4;

// =============================================================================
// SelectionParams
// =============================================================================

/// Parameters for balance-aware model selection.
///
/// Recorded on every calibration artifact, so two dimensions can be tuned
/// independently and a run's scoring is reproducible from its diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionParams {
    /// Smallest candidate segment count; must be >= 2.
    pub k_min: usize,

    /// Largest candidate segment count; clamped to the population at fit
    /// time.
    pub k_max: usize,

    /// Weight of cohesion in the combined score (default: 0.4).
    pub cohesion_weight: f32,

    /// Weight of balance in the combined score (default: 0.6).
    pub balance_weight: f32,

    /// Cohesion below this at the selected k emits a warning (default: 0.3).
    pub min_cohesion: f32,

    /// Balance below this at the selected k emits a warning (default: 0.5).
    pub min_balance: f32,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            k_min: 2,
            k_max: 8,
            cohesion_weight: 0.4,
            balance_weight: 0.6,
            min_cohesion: 0.3,
            min_balance: 0.5,
        }
    }
}

impl SelectionParams {
    /// Set the candidate range.
    #[must_use]
    pub fn with_k_range(mut self, k_min: usize, k_max: usize) -> Self {
        self.k_min = k_min;
        self.k_max = k_max;
        self
    }

    /// Set the score weights.
    #[must_use]
    pub fn with_weights(mut self, cohesion: f32, balance: f32) -> Self {
        self.cohesion_weight = cohesion;
        self.balance_weight = balance;
        self
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::InvalidParameter` if:
    /// - k_min < 2 (cohesion is undefined for one segment)
    /// - k_max < k_min
    /// - weights are not positive or do not sum to 1.0
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.k_min < 2 {
            return Err(ClusterError::invalid_parameter(format!(
                "k_min must be >= 2, got {}",
                self.k_min
            )));
        }
        if self.k_max < self.k_min {
            return Err(ClusterError::invalid_parameter(format!(
                "empty candidate range [{}, {}]",
                self.k_min, self.k_max
            )));
        }
        if self.cohesion_weight <= 0.0 || self.balance_weight <= 0.0 {
            return Err(ClusterError::invalid_parameter(format!(
                "score weights must be positive, got cohesion={}, balance={}",
                self.cohesion_weight, self.balance_weight
            )));
        }
        let sum = self.cohesion_weight + self.balance_weight;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ClusterError::invalid_parameter(format!(
                "score weights must sum to 1.0, got {}",
                sum
            )));
        }
        if !(-1.0..=1.0).contains(&self.min_cohesion) {
            return Err(ClusterError::invalid_parameter(format!(
                "min_cohesion must be in [-1, 1], got {}",
                self.min_cohesion
            )));
        }
        if !(0.0..=1.0).contains(&self.min_balance) {
            return Err(ClusterError::invalid_parameter(format!(
                "min_balance must be in [0, 1], got {}",
                self.min_balance
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Warnings
// =============================================================================

/// Quality-gate warnings recorded on a calibration artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityWarning {
    /// Cohesion at the selected k is below the configured minimum.
    LowCohesion {
        /// The offending cohesion score.
        score: f32,
    },
    /// Balance at the selected k is below the configured minimum.
    LowBalance {
        /// The offending balance score.
        score: f32,
    },
    /// The winning fit hit its iteration cap instead of the tolerance.
    SoftConvergence {
        /// The selected segment count.
        k: usize,
    },
}

impl std::fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityWarning::LowCohesion { score } => {
                write!(f, "poor separation: cohesion {:.3}", score)
            }
            QualityWarning::LowBalance { score } => {
                write!(f, "imbalanced segments: balance {:.3}", score)
            }
            QualityWarning::SoftConvergence { k } => {
                write!(f, "fit at k={} hit the iteration cap", k)
            }
        }
    }
}

// =============================================================================
// Scores
// =============================================================================

/// Scores for one candidate segment count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// The candidate segment count.
    pub k: usize,
    /// Silhouette cohesion in [-1, 1].
    pub cohesion: f32,
    /// Population balance in [0, 1].
    pub balance: f32,
    /// `cohesion_weight * cohesion + balance_weight * balance`.
    pub combined: f32,
    /// Whether this candidate's fit hit the iteration cap.
    pub soft_converged: bool,
}

/// Outcome of model selection for one dimension.
#[derive(Debug, Clone)]
pub struct ModelSelection {
    /// The winning fit at the selected k.
    pub fit: FuzzyFit,
    /// Scores at the selected k.
    pub selected: CandidateScore,
    /// Scores for every candidate, in k order, for diagnostics.
    pub candidates: Vec<CandidateScore>,
    /// Quality-gate warnings at the selected k.
    pub warnings: Vec<QualityWarning>,
}

// =============================================================================
// Selection
// =============================================================================

/// Fit every candidate k in the range and keep the best combined score.
///
/// The effective upper bound is clamped to the row count.
///
/// # Errors
///
/// - `ClusterError::InvalidParameter` for invalid params
/// - `ClusterError::InsufficientData` if no candidate in the range can fit
/// - any fitting error from the fuzzy clusterer
pub fn select_k(
    rows: &[Vec<f32>],
    selection: &SelectionParams,
    fuzzy_params: &FuzzyParams,
) -> Result<ModelSelection, ClusterError> {
    selection.validate()?;

    let effective_max = selection.k_max.min(rows.len());
    if effective_max < selection.k_min {
        return Err(ClusterError::InsufficientData {
            points: rows.len(),
            k: selection.k_min,
        });
    }

    let mut candidates = Vec::with_capacity(effective_max - selection.k_min + 1);
    let mut best: Option<(CandidateScore, FuzzyFit)> = None;

    for k in selection.k_min..=effective_max {
        let fit = fuzzy::fit(rows, k, fuzzy_params)?;
        let labels = fit.hard_labels();

        let cohesion = silhouette(rows, &labels, k);
        let balance = balance_score(&fit.cluster_sizes());
        let combined = selection.cohesion_weight * cohesion + selection.balance_weight * balance;

        let score = CandidateScore {
            k,
            cohesion,
            balance,
            combined,
            soft_converged: fit.soft_converged,
        };
        debug!(
            k,
            cohesion = score.cohesion,
            balance = score.balance,
            combined = score.combined,
            "scored candidate"
        );
        candidates.push(score.clone());

        let better = match &best {
            Some((incumbent, _)) => score.combined > incumbent.combined,
            None => true,
        };
        if better {
            best = Some((score, fit));
        }
    }

    let (selected, fit) = best.ok_or(ClusterError::InsufficientData {
        points: rows.len(),
        k: selection.k_min,
    })?;

    let mut warnings = Vec::new();
    if selected.cohesion < selection.min_cohesion {
        warnings.push(QualityWarning::LowCohesion {
            score: selected.cohesion,
        });
    }
    if selected.balance < selection.min_balance {
        warnings.push(QualityWarning::LowBalance {
            score: selected.balance,
        });
    }
    if selected.soft_converged {
        warnings.push(QualityWarning::SoftConvergence { k: selected.k });
    }
    for warning in &warnings {
        warn!(k = selected.k, "{}", warning);
    }

    Ok(ModelSelection {
        fit,
        selected,
        candidates,
        warnings,
    })
}

/// Population balance: `1 - min(1, cv(sizes))`.
///
/// 1.0 for perfectly equal segments; 0.0 once the coefficient of variation
/// reaches 1 (one dominant segment plus scraps).
pub fn balance_score(sizes: &[usize]) -> f32 {
    if sizes.is_empty() {
        return 0.0;
    }
    let values: Vec<f32> = sizes.iter().map(|&s| s as f32).collect();
    let size_mean = mean(&values);
    if size_mean == 0.0 {
        return 0.0;
    }
    let cv = std_dev(&values, size_mean) / size_mean;
    1.0 - cv.min(1.0)
}

/// Simplified silhouette over hard labels, averaged across all rows.
///
/// For each row: `a` is the mean distance to same-cluster rows, `b` the
/// smallest mean distance to any other cluster, and the silhouette is
/// `(b - a) / max(a, b)`. Rows alone in their cluster score 0.
pub fn silhouette(rows: &[Vec<f32>], labels: &[usize], k: usize) -> f32 {
    let n = rows.len();
    if n < 2 || k < 2 {
        return 0.0;
    }

    let mut cluster_members: Vec<Vec<usize>> = vec![Vec::new(); k];
    for (i, &label) in labels.iter().enumerate() {
        cluster_members[label].push(i);
    }

    let mut total = 0.0f32;
    for i in 0..n {
        let own = labels[i];

        if cluster_members[own].len() < 2 {
            continue; // silhouette 0 for singletons
        }

        let a = mean_distance_to(rows, i, &cluster_members[own], true);

        let mut b = f32::INFINITY;
        for (j, members) in cluster_members.iter().enumerate() {
            if j == own || members.is_empty() {
                continue;
            }
            b = b.min(mean_distance_to(rows, i, members, false));
        }
        if !b.is_finite() {
            continue; // every other cluster empty
        }

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    total / n as f32
}

fn mean_distance_to(rows: &[Vec<f32>], i: usize, members: &[usize], exclude_self: bool) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0usize;
    for &j in members {
        if exclude_self && j == i {
            continue;
        }
        sum += euclidean(&rows[i], &rows[j]);
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}
