//! Core traits: the seams between the analytical core and its
//! collaborators (feature pipelines, persistence, schedulers).

mod feature_source;
mod snapshot_store;

pub use feature_source::FeatureSource;
pub use snapshot_store::{SnapshotStore, TimeRange};
