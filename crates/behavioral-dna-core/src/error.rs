//! Error types for behavioral-dna-core.
//!
//! This module defines the central error type [`CoreError`] used throughout
//! the crate, along with the [`CoreResult<T>`] type alias.
//!
//! # Examples
//!
//! ```rust
//! use behavioral_dna_core::error::CoreError;
//!
//! fn lookup_dimension(name: &str) -> Result<(), CoreError> {
//!     Err(CoreError::DimensionNotFound { name: name.to_string() })
//! }
//!
//! let result = lookup_dimension("engagement");
//! assert!(result.is_err());
//! ```

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for behavioral-dna-core operations.
///
/// Provides structured error variants for all failure modes in the core
/// library, enabling precise error handling and informative error messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Calibration population is below the configured minimum.
    ///
    /// # When This Occurs
    ///
    /// - Fewer entities than `min_population` have usable features
    /// - A dimension's feature source returned an empty population
    ///
    /// Calibration fails closed: the previously published dimension version
    /// remains authoritative and no partial result is visible.
    #[error("Insufficient population for '{dimension}': {actual} usable entities, {required} required")]
    InsufficientPopulation {
        /// The dimension being calibrated
        dimension: String,
        /// Minimum usable entities required
        required: usize,
        /// Usable entities actually available
        actual: usize,
    },

    /// A dimension has no published version.
    ///
    /// # When This Occurs
    ///
    /// - Categorizing against a dimension that was never calibrated
    /// - Looking up a dimension by a name that does not exist
    #[error("Dimension not found: {name}")]
    DimensionNotFound {
        /// Name of the missing dimension
        name: String,
    },

    /// A specific dimension version is no longer available.
    #[error("Dimension version not found: {version}")]
    VersionNotFound {
        /// The requested version id
        version: Uuid,
    },

    /// An entity has too few snapshots for the requested analysis.
    ///
    /// # When This Occurs
    ///
    /// - Journey characterization over fewer than two snapshots
    /// - Drift analysis when the time window holds a single capture
    #[error("Insufficient snapshot history for entity {entity_id}: {actual} snapshots, {required} required")]
    InsufficientHistory {
        /// The entity whose history was queried
        entity_id: Uuid,
        /// Minimum snapshots required
        required: usize,
        /// Snapshots actually available
        actual: usize,
    },

    /// Two snapshots passed to a pairwise operation belong to different entities.
    #[error("Snapshot entity mismatch: {left} vs {right}")]
    EntityMismatch {
        /// Entity of the first snapshot
        left: Uuid,
        /// Entity of the second snapshot
        right: Uuid,
    },

    /// A field value failed validation constraints.
    ///
    /// # When This Occurs
    ///
    /// - Membership weight outside [0, 1]
    /// - Membership vector that does not sum to 1 within tolerance
    /// - NaN or Infinity in numeric fields
    #[error("Validation error: {field} - {message}")]
    ValidationError {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// An error occurred during snapshot store operations.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration is invalid or missing.
    ///
    /// # When This Occurs
    ///
    /// - Missing required configuration file
    /// - Invalid configuration value format
    /// - Environment variable parsing failure
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error raised by the clustering subsystem.
    #[error("Clustering error: {0}")]
    Clustering(#[from] crate::clustering::ClusterError),

    /// Error during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An unexpected internal error occurred.
    ///
    /// # When This Occurs
    ///
    /// - Invariant violation detected (e.g. subdivision depth overrun)
    /// - Unrecoverable state corruption
    ///
    /// These errors indicate bugs and should be reported.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::ConfigError(err.to_string())
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
