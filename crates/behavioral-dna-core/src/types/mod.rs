//! Core domain types.
//!
//! # Key Types
//!
//! - [`Dimension`]: one versioned, immutable behavioral axis
//! - [`Segment`]: one discovered cluster within a dimension
//! - [`MembershipVector`]: soft membership over a dimension's leaf segments
//! - [`BehavioralDna`]: an entity's full fingerprint across dimensions
//! - [`Snapshot`]: an immutable, timestamped DNA capture
//! - [`SnapshotRecord`]: the persistence wire shape for snapshots
//!
//! Ownership follows the calibration/categorization split: dimensions and
//! segments are produced by calibration and shared read-only; DNA and
//! snapshots are owned per entity and never shared or mutated across
//! entities.

mod dimension;
mod dna;
mod membership;
mod segment;
mod snapshot;

pub use dimension::{Dimension, DimensionQuality, DimensionVersion};
pub use dna::{BehavioralDna, DimensionMembership};
pub use membership::{MembershipVector, MEMBERSHIP_SUM_TOLERANCE};
pub use segment::{Segment, SegmentId};
pub use snapshot::{RetentionClass, Snapshot, SnapshotRecord};
