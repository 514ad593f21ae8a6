//! Raw feature access for calibration and categorization.

use uuid::Uuid;

/// Supplies raw per-entity feature rows for one dimension's schema.
///
/// Implementations own the mapping from raw historical facts (events,
/// transactions) to fixed-length numeric rows; this crate only sees the
/// rows. A `None` cell is an explicitly missing observation; preparation
/// imputes it with the population median, never a silent zero.
///
/// The trait is synchronous: calibration is a CPU-bound batch sweep over
/// the full population and runs under rayon, so implementations should
/// materialize their data before handing it to this crate.
pub trait FeatureSource: Send + Sync {
    /// All entities with any recorded history for the dimension.
    fn entity_ids(&self, dimension: &str) -> Vec<Uuid>;

    /// The entity's raw feature row for the dimension, with per-feature
    /// missingness. `None` means the entity has no row at all there.
    fn raw_features(&self, entity_id: Uuid, dimension: &str) -> Option<Vec<Option<f32>>>;

    /// Raw observations backing the entity's row for the dimension. Used
    /// for cold-start detection, not for clustering.
    fn observation_count(&self, entity_id: Uuid, dimension: &str) -> usize;
}
