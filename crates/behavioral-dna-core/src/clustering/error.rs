//! Error types for clustering operations.

use thiserror::Error;

/// Errors raised by the fuzzy clusterer, model selector, and subdivision
/// engine.
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    /// A parameter failed validation.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Not enough data points for the requested fit.
    ///
    /// Raised when the population is smaller than the candidate cluster
    /// count, or when a slice handed to a mini-calibration is empty.
    #[error("Insufficient data: {points} points for k={k}")]
    InsufficientData {
        /// Points available.
        points: usize,
        /// Requested cluster count.
        k: usize,
    },

    /// Input rows disagree on feature count.
    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch {
        /// Expected feature count.
        expected: usize,
        /// Actual feature count encountered.
        actual: usize,
    },

    /// Non-finite value encountered in input data.
    #[error("Non-finite value in row {row}, feature {feature}")]
    NonFiniteInput {
        /// Row index of the offending value.
        row: usize,
        /// Feature index of the offending value.
        feature: usize,
    },

    /// Subdivision produced a work item past the depth cap.
    ///
    /// Structurally impossible given the cap and size floor; if it ever
    /// fires, calibration aborts rather than publishing an unbounded tree.
    #[error("Subdivision depth {depth} exceeds max_depth {max_depth}")]
    DepthExceeded {
        /// Depth of the offending work item.
        depth: u8,
        /// The configured cap.
        max_depth: u8,
    },
}

impl ClusterError {
    /// Construct an `InvalidParameter` error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        ClusterError::InvalidParameter(message.into())
    }
}
