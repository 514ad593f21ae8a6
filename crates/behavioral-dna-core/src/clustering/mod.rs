//! Fuzzy segmentation: clustering, model selection, and subdivision.
//!
//! # Key Types
//!
//! - [`FuzzyParams`] / [`fuzzy::fit`]: fuzzy c-means with seeded restarts
//! - [`ModelSelection`] / [`select_k`]: balance-aware segment-count choice
//! - [`SubdivisionConfig`] / [`subdivide`]: worklist-driven segment trees
//! - [`QualityWarning`]: soft quality gates recorded on the artifact
//! - [`ClusterError`]: error types for clustering operations
//!
//! Calibration wires these together per dimension; categorization reuses
//! only [`fuzzy::soft_membership`] against published centers.

pub mod error;
pub mod fuzzy;
pub mod selection;
pub mod subdivision;

pub use error::ClusterError;
pub use fuzzy::{soft_membership, FuzzyFit, FuzzyParams};
pub use selection::{select_k, CandidateScore, ModelSelection, QualityWarning, SelectionParams};
pub use subdivision::{subdivide, SubdivisionConfig};
