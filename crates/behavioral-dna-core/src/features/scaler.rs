//! Outlier-aware feature scaling.
//!
//! Each feature gets its own scaler, chosen from the measured shape of the
//! column: a robust median/IQR scaler when the outlier share exceeds the
//! configured threshold or the skew is large in magnitude, otherwise a
//! mean/standard-deviation scaler. The fitted parameters are persisted on
//! the dimension so categorization applies the exact same transform.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Configuration for scaler selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    /// Outlier share above which the robust scaler is used (default: 0.05).
    pub outlier_share_threshold: f32,
    /// Absolute skewness above which the robust scaler is used (default: 0.5).
    pub skew_threshold: f32,
    /// IQR fence multiplier for outlier detection (default: 1.5).
    pub outlier_iqr_factor: f32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            outlier_share_threshold: 0.05,
            skew_threshold: 0.5,
            outlier_iqr_factor: 1.5,
        }
    }
}

impl ScalingConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConfigError` if any threshold is non-positive or
    /// the outlier share is not a valid fraction.
    pub fn validate(&self) -> CoreResult<()> {
        if !(0.0..=1.0).contains(&self.outlier_share_threshold) {
            return Err(CoreError::ConfigError(format!(
                "outlier_share_threshold must be in [0, 1], got {}",
                self.outlier_share_threshold
            )));
        }
        if self.skew_threshold <= 0.0 {
            return Err(CoreError::ConfigError(format!(
                "skew_threshold must be > 0, got {}",
                self.skew_threshold
            )));
        }
        if self.outlier_iqr_factor <= 0.0 {
            return Err(CoreError::ConfigError(format!(
                "outlier_iqr_factor must be > 0, got {}",
                self.outlier_iqr_factor
            )));
        }
        Ok(())
    }
}

/// Fitted scaler parameters for one feature.
///
/// Serialized alongside the dimension; the same parameters transform both
/// the calibration matrix and every later categorization query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeatureScaler {
    /// Mean / standard deviation scaling for well-behaved columns.
    Standard {
        /// Column mean.
        mean: f32,
        /// Column standard deviation; 1.0 substituted for constant columns.
        std_dev: f32,
    },
    /// Median / IQR scaling for skewed or outlier-heavy columns.
    Robust {
        /// Column median.
        median: f32,
        /// Interquartile range; 1.0 substituted for degenerate columns.
        iqr: f32,
    },
}

impl FeatureScaler {
    /// Fit a scaler for one feature column.
    ///
    /// Selection rule: robust when `outlier_share > config.outlier_share_threshold`
    /// or `|skew| > config.skew_threshold`, standard otherwise.
    pub fn fit(values: &[f32], config: &ScalingConfig) -> Self {
        let outliers = outlier_share(values, config.outlier_iqr_factor);
        let skew = skewness(values);

        if outliers > config.outlier_share_threshold || skew.abs() > config.skew_threshold {
            let median = median(values);
            let (q1, q3) = quartiles(values);
            let iqr = q3 - q1;
            FeatureScaler::Robust {
                median,
                iqr: if iqr > 0.0 { iqr } else { 1.0 },
            }
        } else {
            let mean = mean(values);
            let std_dev = std_dev(values, mean);
            FeatureScaler::Standard {
                mean,
                std_dev: if std_dev > 0.0 { std_dev } else { 1.0 },
            }
        }
    }

    /// Apply the fitted transform to a raw value.
    #[inline]
    pub fn transform(&self, value: f32) -> f32 {
        match self {
            FeatureScaler::Standard { mean, std_dev } => (value - mean) / std_dev,
            FeatureScaler::Robust { median, iqr } => (value - median) / iqr,
        }
    }

    /// The column's central value, used to impute missing observations at
    /// categorization time.
    #[inline]
    pub fn center(&self) -> f32 {
        match self {
            FeatureScaler::Standard { mean, .. } => *mean,
            FeatureScaler::Robust { median, .. } => *median,
        }
    }
}

// =============================================================================
// Column statistics
// =============================================================================

pub(crate) fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

pub(crate) fn std_dev(values: &[f32], mean: f32) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
    variance.sqrt()
}

pub(crate) fn median(values: &[f32]) -> f32 {
    percentile(values, 0.5)
}

/// First and third quartiles.
pub(crate) fn quartiles(values: &[f32]) -> (f32, f32) {
    (percentile(values, 0.25), percentile(values, 0.75))
}

/// Percentile by linear interpolation over a sorted copy.
pub(crate) fn percentile(values: &[f32], p: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = p * (sorted.len() - 1) as f32;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        let weight = rank - low as f32;
        sorted[low] * (1.0 - weight) + sorted[high] * weight
    }
}

/// Fisher-Pearson skewness coefficient. 0.0 for constant columns.
pub(crate) fn skewness(values: &[f32]) -> f32 {
    let m = mean(values);
    let sd = std_dev(values, m);
    if sd == 0.0 || values.len() < 3 {
        return 0.0;
    }
    values.iter().map(|v| ((v - m) / sd).powi(3)).sum::<f32>() / values.len() as f32
}

/// Share of values outside the IQR fence `[q1 - factor*iqr, q3 + factor*iqr]`.
pub(crate) fn outlier_share(values: &[f32], factor: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let (q1, q3) = quartiles(values);
    let iqr = q3 - q1;
    let (low, high) = (q1 - factor * iqr, q3 + factor * iqr);
    let outliers = values.iter().filter(|&&v| v < low || v > high).count();
    outliers as f32 / values.len() as f32
}
