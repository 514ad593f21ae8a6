//! Fuzzy c-means clustering.
//!
//! Fits k soft cluster centers by iterative relaxation: centers are the
//! fuzziness-weighted averages of all rows, memberships are inversely
//! proportional to relative distances raised to `2/(m-1)`, and each row's
//! memberships sum to exactly 1. The fit converges to a local minimum, so
//! several seeded restarts run (in parallel) and the lowest-objective result
//! wins. Hitting the iteration cap is a soft-converged result, recorded in
//! the diagnostics, never an error.
//!
//! # Example
//!
//! ```
//! use behavioral_dna_core::clustering::FuzzyParams;
//!
//! let params = FuzzyParams::default().with_seed(7);
//! assert_eq!(params.fuzziness, 2.0);
//! assert!(params.validate().is_ok());
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ClusterError;

/// Default fuzziness exponent.
pub const DEFAULT_FUZZINESS: f32 = 2.0;

/// Default convergence tolerance on the membership matrix.
pub const DEFAULT_TOLERANCE: f32 = 1e-4;

/// Default iteration cap per restart.
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// Default number of random restarts.
pub const DEFAULT_RESTARTS: usize = 5;

/// Seed spacing between restarts, so derived seeds do not collide.
const RESTART_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

// =============================================================================
// FuzzyParams
// =============================================================================

/// Parameters for the fuzzy clusterer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyParams {
    /// Fuzziness exponent m; must be > 1.0. Higher is softer.
    pub fuzziness: f32,

    /// Convergence tolerance: maximum absolute membership change between
    /// sweeps below which the fit is converged.
    pub tolerance: f32,

    /// Iteration cap per restart. Hitting it yields a soft-converged fit.
    pub max_iterations: usize,

    /// Number of random restarts; the lowest-objective result is kept.
    pub restarts: usize,

    /// Base seed for reproducible runs. `None` draws a fresh seed, which is
    /// then recorded in the fit for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for FuzzyParams {
    fn default() -> Self {
        Self {
            fuzziness: DEFAULT_FUZZINESS,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            restarts: DEFAULT_RESTARTS,
            seed: None,
        }
    }
}

impl FuzzyParams {
    /// Set the fuzziness exponent.
    #[must_use]
    pub fn with_fuzziness(mut self, fuzziness: f32) -> Self {
        self.fuzziness = fuzziness;
        self
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the restart count.
    #[must_use]
    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    /// Set the base seed for reproducible fits.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::InvalidParameter` if:
    /// - fuzziness <= 1.0 (the membership update divides by m - 1)
    /// - tolerance is not strictly positive
    /// - max_iterations or restarts is zero
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.fuzziness <= 1.0 || !self.fuzziness.is_finite() {
            return Err(ClusterError::invalid_parameter(format!(
                "fuzziness must be > 1.0, got {}. The membership exponent is 2/(m-1).",
                self.fuzziness
            )));
        }
        if self.tolerance <= 0.0 || !self.tolerance.is_finite() {
            return Err(ClusterError::invalid_parameter(format!(
                "tolerance must be > 0, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(ClusterError::invalid_parameter(
                "max_iterations must be > 0",
            ));
        }
        if self.restarts == 0 {
            return Err(ClusterError::invalid_parameter("restarts must be > 0"));
        }
        Ok(())
    }
}

// =============================================================================
// FuzzyFit
// =============================================================================

/// Result of one fuzzy clustering fit (best over all restarts).
#[derive(Debug, Clone)]
pub struct FuzzyFit {
    /// Cluster centers, k rows in scaled-feature space.
    pub centers: Vec<Vec<f32>>,

    /// Membership matrix, one row per input row; each row sums to 1.
    pub memberships: Vec<Vec<f32>>,

    /// Objective value: sum of membership^m * squared distance.
    pub objective: f32,

    /// Iterations used by the winning restart.
    pub iterations: usize,

    /// True when the winning restart hit the iteration cap instead of the
    /// tolerance. Usable, but callers may flag it in diagnostics.
    pub soft_converged: bool,

    /// The base seed actually used, for reproducing the fit.
    pub seed: u64,
}

impl FuzzyFit {
    /// Hard (argmax) cluster label per row.
    pub fn hard_labels(&self) -> Vec<usize> {
        self.memberships
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(j, _)| j)
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Member counts per cluster from hard labels.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let k = self.centers.len();
        let mut sizes = vec![0usize; k];
        for label in self.hard_labels() {
            sizes[label] += 1;
        }
        sizes
    }
}

// =============================================================================
// Fitting
// =============================================================================

/// Fit k fuzzy clusters to the given rows.
///
/// # Errors
///
/// - `ClusterError::InvalidParameter` for k < 1 or invalid params
/// - `ClusterError::InsufficientData` when rows.len() < k
/// - `ClusterError::DimensionMismatch` / `NonFiniteInput` for malformed rows
pub fn fit(rows: &[Vec<f32>], k: usize, params: &FuzzyParams) -> Result<FuzzyFit, ClusterError> {
    params.validate()?;
    validate_rows(rows)?;

    if k == 0 {
        return Err(ClusterError::invalid_parameter("k must be >= 1"));
    }
    if rows.len() < k {
        return Err(ClusterError::InsufficientData {
            points: rows.len(),
            k,
        });
    }

    let base_seed = params.seed.unwrap_or_else(rand::random);

    let best = (0..params.restarts)
        .into_par_iter()
        .map(|restart| {
            let seed = base_seed.wrapping_add((restart as u64).wrapping_mul(RESTART_SEED_STRIDE));
            fit_once(rows, k, params, seed)
        })
        .min_by(|a, b| {
            a.objective
                .partial_cmp(&b.objective)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

    let mut fit =
        best.ok_or_else(|| ClusterError::invalid_parameter("restarts must be > 0"))?;
    fit.seed = base_seed;

    debug!(
        k,
        objective = fit.objective,
        iterations = fit.iterations,
        soft_converged = fit.soft_converged,
        "fuzzy fit complete"
    );
    Ok(fit)
}

/// One restart from a seeded random membership matrix.
fn fit_once(rows: &[Vec<f32>], k: usize, params: &FuzzyParams, seed: u64) -> FuzzyFit {
    let n = rows.len();
    let features = rows[0].len();
    let m = params.fuzziness;
    let mut rng = StdRng::seed_from_u64(seed);

    // Random memberships, each row normalized to sum 1.
    let mut memberships: Vec<Vec<f32>> = (0..n)
        .map(|_| {
            let mut row: Vec<f32> = (0..k).map(|_| rng.gen::<f32>() + 1e-3).collect();
            let sum: f32 = row.iter().sum();
            for w in &mut row {
                *w /= sum;
            }
            row
        })
        .collect();

    let mut centers = vec![vec![0.0f32; features]; k];
    let mut iterations = 0;
    let mut soft_converged = true;

    for iteration in 0..params.max_iterations {
        iterations = iteration + 1;

        update_centers(rows, &memberships, m, &mut centers);

        let mut max_delta = 0.0f32;
        for (row, membership) in rows.iter().zip(memberships.iter_mut()) {
            let distances: Vec<f32> = centers
                .iter()
                .map(|center| euclidean(row, center))
                .collect();
            let updated = membership_row(&distances, m);

            for (old, new) in membership.iter().zip(updated.iter()) {
                max_delta = max_delta.max((old - new).abs());
            }
            *membership = updated;
        }

        if max_delta < params.tolerance {
            soft_converged = false;
            break;
        }
    }

    // Final centers for the converged memberships, then the objective.
    update_centers(rows, &memberships, m, &mut centers);
    let objective = objective(rows, &memberships, &centers, m);

    FuzzyFit {
        centers,
        memberships,
        objective,
        iterations,
        soft_converged,
        seed,
    }
}

/// Recompute each center as the fuzziness-weighted average of all rows.
fn update_centers(rows: &[Vec<f32>], memberships: &[Vec<f32>], m: f32, centers: &mut [Vec<f32>]) {
    let features = rows[0].len();

    for (j, center) in centers.iter_mut().enumerate() {
        let mut weighted = vec![0.0f32; features];
        let mut total = 0.0f32;

        for (row, membership) in rows.iter().zip(memberships.iter()) {
            let weight = membership[j].powf(m);
            total += weight;
            for (acc, &value) in weighted.iter_mut().zip(row.iter()) {
                *acc += weight * value;
            }
        }

        if total > 0.0 {
            for (slot, acc) in center.iter_mut().zip(weighted.iter()) {
                *slot = acc / total;
            }
        }
        // A cluster with zero total weight keeps its previous center; the
        // next membership sweep will repopulate or starve it.
    }
}

/// Membership of one row across all clusters from its center distances.
///
/// A row coincident with a center (distance 0) gets hard membership 1.0 on
/// that cluster, bypassing the division.
pub(crate) fn membership_row(distances: &[f32], m: f32) -> Vec<f32> {
    let k = distances.len();

    if let Some(coincident) = distances.iter().position(|&d| d == 0.0) {
        let mut row = vec![0.0f32; k];
        row[coincident] = 1.0;
        return row;
    }

    let exponent = 2.0 / (m - 1.0);
    let mut row = Vec::with_capacity(k);
    for &dj in distances {
        let denominator: f32 = distances
            .iter()
            .map(|&dl| (dj / dl).powf(exponent))
            .sum();
        row.push(1.0 / denominator);
    }

    // Renormalize to absorb floating-point residue so rows sum to exactly 1.
    let sum: f32 = row.iter().sum();
    for w in &mut row {
        *w /= sum;
    }
    row
}

/// Project one row onto fitted centers (inference mode, no re-fitting).
///
/// This is the same distance-to-membership formula the fit uses; the
/// profile composer calls it to categorize entities against a published
/// dimension version.
pub fn soft_membership(row: &[f32], centers: &[Vec<f32>], m: f32) -> Vec<f32> {
    let distances: Vec<f32> = centers.iter().map(|center| euclidean(row, center)).collect();
    membership_row(&distances, m)
}

/// Objective: sum over rows and clusters of membership^m * squared distance.
fn objective(rows: &[Vec<f32>], memberships: &[Vec<f32>], centers: &[Vec<f32>], m: f32) -> f32 {
    rows.iter()
        .zip(memberships.iter())
        .map(|(row, membership)| {
            centers
                .iter()
                .zip(membership.iter())
                .map(|(center, &w)| w.powf(m) * squared_euclidean(row, center))
                .sum::<f32>()
        })
        .sum()
}

/// Euclidean distance between two equal-length vectors.
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean(a, b).sqrt()
}

/// Squared Euclidean distance.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn validate_rows(rows: &[Vec<f32>]) -> Result<(), ClusterError> {
    let features = match rows.first() {
        Some(row) => row.len(),
        None => {
            return Err(ClusterError::InsufficientData { points: 0, k: 1 });
        }
    };
    if features == 0 {
        return Err(ClusterError::DimensionMismatch {
            expected: 1,
            actual: 0,
        });
    }

    for (i, row) in rows.iter().enumerate() {
        if row.len() != features {
            return Err(ClusterError::DimensionMismatch {
                expected: features,
                actual: row.len(),
            });
        }
        for (j, value) in row.iter().enumerate() {
            if !value.is_finite() {
                return Err(ClusterError::NonFiniteInput { row: i, feature: j });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tight blobs around 0.0 and 10.0 on one feature.
    fn two_blobs(per_blob: usize) -> Vec<Vec<f32>> {
        let mut rows = Vec::with_capacity(per_blob * 2);
        for i in 0..per_blob {
            let jitter = (i % 5) as f32 * 0.01;
            rows.push(vec![0.0 + jitter]);
            rows.push(vec![10.0 + jitter]);
        }
        rows
    }

    #[test]
    fn test_params_validation() {
        assert!(FuzzyParams::default().validate().is_ok());
        assert!(FuzzyParams::default().with_fuzziness(1.0).validate().is_err());
        assert!(FuzzyParams::default().with_tolerance(0.0).validate().is_err());
        assert!(FuzzyParams::default().with_restarts(0).validate().is_err());
    }

    #[test]
    fn test_memberships_sum_to_one() {
        let rows = two_blobs(20);
        let fit = fit(&rows, 2, &FuzzyParams::default().with_seed(42)).unwrap();

        for row in &fit.memberships {
            let sum: f32 = row.iter().sum();
            assert!(
                (sum - 1.0).abs() <= 1e-6,
                "membership row sums to {}, expected 1.0",
                sum
            );
        }
        println!("[PASS] test_memberships_sum_to_one - n={}", rows.len());
    }

    #[test]
    fn test_separated_blobs_get_confident_memberships() {
        let rows = two_blobs(25);
        let fit = fit(&rows, 2, &FuzzyParams::default().with_seed(7)).unwrap();

        // Every row near 0.0 should strongly prefer one cluster, rows near
        // 10.0 the other.
        let labels = fit.hard_labels();
        let label_at_zero = labels[0];
        for (row, label) in rows.iter().zip(labels.iter()) {
            let expected = if row[0] < 5.0 { label_at_zero } else { 1 - label_at_zero };
            assert_eq!(*label, expected, "row {:?} misassigned", row);
        }

        for membership in &fit.memberships {
            let top = membership.iter().cloned().fold(0.0f32, f32::max);
            assert!(top > 0.9, "well-separated point has weak membership {}", top);
        }
    }

    #[test]
    fn test_coincident_point_gets_hard_membership() {
        let row = membership_row(&[0.0, 3.0, 5.0], 2.0);
        assert_eq!(row, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let rows = two_blobs(15);
        let params = FuzzyParams::default().with_seed(99);

        let a = fit(&rows, 2, &params).unwrap();
        let b = fit(&rows, 2, &params).unwrap();
        assert_eq!(a.memberships, b.memberships);
        assert_eq!(a.objective, b.objective);
    }

    #[test]
    fn test_insufficient_points_rejected() {
        let rows = vec![vec![1.0], vec![2.0]];
        let result = fit(&rows, 3, &FuzzyParams::default());
        assert!(matches!(
            result,
            Err(ClusterError::InsufficientData { points: 2, k: 3 })
        ));
    }

    #[test]
    fn test_iteration_cap_soft_converges() {
        let rows = two_blobs(20);
        // One iteration cannot reach tolerance from a random start.
        let params = FuzzyParams::default()
            .with_max_iterations(1)
            .with_seed(5);
        let fit = fit(&rows, 2, &params).unwrap();
        assert!(fit.soft_converged, "cap hit must flag soft convergence");
        assert_eq!(fit.iterations, 1);
    }

    #[test]
    fn test_inference_matches_fit_formula() {
        let rows = two_blobs(20);
        let fitted = fit(&rows, 2, &FuzzyParams::default().with_seed(3)).unwrap();

        let projected = soft_membership(&rows[0], &fitted.centers, 2.0);
        let sum: f32 = projected.iter().sum();
        assert!((sum - 1.0).abs() <= 1e-6);

        // A point at a blob center projects near the fitted membership.
        let dominant = projected
            .iter()
            .cloned()
            .fold(0.0f32, f32::max);
        assert!(dominant > 0.9);
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let rows = vec![vec![1.0], vec![f32::NAN]];
        assert!(matches!(
            fit(&rows, 1, &FuzzyParams::default()),
            Err(ClusterError::NonFiniteInput { row: 1, feature: 0 })
        ));
    }
}
