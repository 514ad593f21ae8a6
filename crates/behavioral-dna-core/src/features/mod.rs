//! Feature preparation: raw facts to scaled feature matrices.
//!
//! Calibration input arrives as per-entity raw feature rows with explicit
//! missingness (`Option<f32>` per feature). Preparation:
//!
//! 1. excludes entities with zero usable features (tracked, never fabricated);
//! 2. imputes remaining gaps with the population median for that feature;
//! 3. fits an outlier-aware scaler per feature and applies it.
//!
//! The fitted [`FeatureScaler`] parameters travel with the dimension so
//! categorization reuses the exact calibration transform.

mod scaler;

pub use scaler::{FeatureScaler, ScalingConfig};

pub(crate) use scaler::{mean, median, percentile, std_dev};

use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// A scaled feature matrix ready for clustering, plus everything needed to
/// reproduce the transform at categorization time.
#[derive(Debug, Clone)]
pub struct PreparedMatrix {
    /// Entities in row order.
    pub entity_ids: Vec<Uuid>,
    /// Scaled feature rows, one per entity.
    pub rows: Vec<Vec<f32>>,
    /// Fitted per-feature scalers, in column order.
    pub scalers: Vec<FeatureScaler>,
    /// Entities excluded for having zero usable features.
    pub excluded: Vec<Uuid>,
    /// Number of features per row.
    pub feature_count: usize,
}

impl PreparedMatrix {
    /// Number of usable entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no entity survived preparation.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Prepare a raw population for calibration.
///
/// `raw` holds one row per entity; a `None` cell is a missing observation
/// for that feature. Rows must share a length.
///
/// # Errors
///
/// - `CoreError::ValidationError` if rows disagree on feature count, if the
///   population has zero features per row, or if some feature column has no
///   observations anywhere in the population (no median to impute with).
pub fn prepare(
    raw: &[(Uuid, Vec<Option<f32>>)],
    config: &ScalingConfig,
) -> CoreResult<PreparedMatrix> {
    config.validate()?;

    let feature_count = match raw.first() {
        Some((_, row)) => row.len(),
        None => 0,
    };
    if feature_count == 0 {
        return Err(CoreError::ValidationError {
            field: "raw".to_string(),
            message: "population has no feature columns".to_string(),
        });
    }

    let mut entity_ids = Vec::with_capacity(raw.len());
    let mut kept_rows: Vec<&Vec<Option<f32>>> = Vec::with_capacity(raw.len());
    let mut excluded = Vec::new();

    for (id, row) in raw {
        if row.len() != feature_count {
            return Err(CoreError::ValidationError {
                field: "raw".to_string(),
                message: format!(
                    "entity {} has {} features, expected {}",
                    id,
                    row.len(),
                    feature_count
                ),
            });
        }
        if row.iter().all(|cell| cell.is_none()) {
            excluded.push(*id);
        } else {
            entity_ids.push(*id);
            kept_rows.push(row);
        }
    }

    if !excluded.is_empty() {
        debug!(
            excluded = excluded.len(),
            kept = kept_rows.len(),
            "excluded entities with zero usable features"
        );
    }

    // Population median per column, for imputation.
    let mut medians = Vec::with_capacity(feature_count);
    for feature in 0..feature_count {
        let observed: Vec<f32> = kept_rows
            .iter()
            .filter_map(|row| row[feature])
            .collect();
        if observed.is_empty() {
            return Err(CoreError::ValidationError {
                field: "raw".to_string(),
                message: format!("feature column {} has no observations in the population", feature),
            });
        }
        medians.push(median(&observed));
    }

    // Impute, then fit and apply one scaler per column.
    let imputed: Vec<Vec<f32>> = kept_rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(feature, cell)| cell.unwrap_or(medians[feature]))
                .collect()
        })
        .collect();

    let mut scalers = Vec::with_capacity(feature_count);
    for feature in 0..feature_count {
        let column: Vec<f32> = imputed.iter().map(|row| row[feature]).collect();
        scalers.push(FeatureScaler::fit(&column, config));
    }

    let rows: Vec<Vec<f32>> = imputed
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(feature, &value)| scalers[feature].transform(value))
                .collect()
        })
        .collect();

    Ok(PreparedMatrix {
        entity_ids,
        rows,
        scalers,
        excluded,
        feature_count,
    })
}

/// Scale one entity's raw row with a dimension's persisted scalers,
/// imputing missing cells with each scaler's center.
///
/// Returns `None` when the row has zero usable features; the entity is then
/// excluded from that dimension rather than given a fabricated vector.
pub fn scale_row(raw: &[Option<f32>], scalers: &[FeatureScaler]) -> Option<Vec<f32>> {
    if raw.len() != scalers.len() || raw.iter().all(|cell| cell.is_none()) {
        return None;
    }
    Some(
        raw.iter()
            .zip(scalers.iter())
            .map(|(cell, scaler)| scaler.transform(cell.unwrap_or_else(|| scaler.center())))
            .collect(),
    )
}
