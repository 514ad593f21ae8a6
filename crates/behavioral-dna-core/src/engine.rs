//! The engine facade: the contracts this core exposes to its collaborators.
//!
//! [`BehavioralDnaEngine`] wires the calibrator, the versioned dimension
//! registry, the profile composer, the drift analyzer, and the journey
//! characterizer around caller-supplied [`FeatureSource`] and
//! [`SnapshotStore`] implementations.
//!
//! # Concurrency
//!
//! Calibration is a batch operation; callers serialize recalibration per
//! dimension name (two competing calibrations of the same name would race
//! on which version wins publication). Independent dimensions calibrate in
//! parallel via [`calibrate_all`]. Categorization only reads published
//! immutable versions and may run fully in parallel across entities.
//!
//! [`calibrate_all`]: BehavioralDnaEngine::calibrate_all

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::calibration::{CalibrationResult, Calibrator, DimensionRegistry};
use crate::config::Config;
use crate::drift::DriftAnalyzer;
use crate::error::{CoreError, CoreResult};
use crate::journey::{Journey, JourneyCharacterizer};
use crate::profile::ProfileComposer;
use crate::traits::{FeatureSource, SnapshotStore, TimeRange};
use crate::types::{BehavioralDna, RetentionClass, Snapshot};

/// Result of a journey query: the window's snapshots plus their
/// characterization (which carries the pairwise drift records).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyView {
    /// Snapshots in the queried window, time-ordered.
    pub snapshots: Vec<Snapshot>,
    /// The characterized journey over those snapshots.
    pub journey: Journey,
}

/// Facade over the behavioral DNA core.
pub struct BehavioralDnaEngine {
    config: Config,
    registry: DimensionRegistry,
    composer: ProfileComposer,
    analyzer: DriftAnalyzer,
    characterizer: JourneyCharacterizer,
    source: Arc<dyn FeatureSource>,
    store: Arc<dyn SnapshotStore>,
}

impl BehavioralDnaEngine {
    /// Create an engine over the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConfigError` when any configuration section is
    /// invalid.
    pub fn new(
        config: Config,
        source: Arc<dyn FeatureSource>,
        store: Arc<dyn SnapshotStore>,
    ) -> CoreResult<Self> {
        config.validate()?;

        let analyzer = DriftAnalyzer::new(config.drift.clone());
        Ok(Self {
            composer: ProfileComposer::new(config.profile.clone()),
            characterizer: JourneyCharacterizer::new(config.journey.clone(), analyzer.clone()),
            analyzer,
            registry: DimensionRegistry::new(),
            config,
            source,
            store,
        })
    }

    /// The versioned dimension registry.
    pub fn registry(&self) -> &DimensionRegistry {
        &self.registry
    }

    /// The drift analyzer, for callers comparing arbitrary snapshot pairs.
    pub fn analyzer(&self) -> &DriftAnalyzer {
        &self.analyzer
    }

    // =========================================================================
    // Calibration trigger
    // =========================================================================

    /// Calibrate one dimension and publish the new version atomically.
    ///
    /// Without `force`, a current version fitted within
    /// `recalibration_interval_days` is kept and returned with
    /// `skipped = true`. `k_range` overrides the configured candidate range
    /// for this run only.
    ///
    /// # Errors
    ///
    /// Fails closed: on any error (insufficient population, fitting
    /// failure, tree invariant violation) no new version is published and
    /// the previous version remains authoritative.
    pub fn calibrate(
        &self,
        dimension: &str,
        k_range: Option<(usize, usize)>,
        force: bool,
    ) -> CoreResult<CalibrationResult> {
        let previous = self.registry.current(dimension);

        if !force {
            if let Some(current) = &previous {
                let age_days = (Utc::now() - current.fitted_at).num_days();
                if age_days < self.config.calibration.recalibration_interval_days {
                    info!(
                        dimension,
                        age_days, "current version still fresh, skipping recalibration"
                    );
                    return Ok(CalibrationResult::skipped(current));
                }
            }
        }

        let mut calibration = self.config.calibration.clone();
        if let Some((k_min, k_max)) = k_range {
            calibration = calibration.with_k_range(k_min, k_max);
        }

        let calibrator = Calibrator::new(calibration);
        let (dimension, result) =
            calibrator.calibrate(dimension, self.source.as_ref(), previous.as_deref())?;

        self.registry.publish(dimension);
        Ok(result)
    }

    /// Calibrate several independent dimensions in parallel.
    ///
    /// Returns one result per name, in input order; a failing dimension
    /// does not affect the others (each fails closed independently).
    pub fn calibrate_all(
        &self,
        dimensions: &[&str],
        force: bool,
    ) -> Vec<CoreResult<CalibrationResult>> {
        dimensions
            .par_iter()
            .map(|name| self.calibrate(name, None, force))
            .collect()
    }

    // =========================================================================
    // Categorization
    // =========================================================================

    /// Compose an entity's DNA against all current dimension versions.
    ///
    /// Always binds to the currently published versions; an entity last
    /// categorized against an older version is simply refreshed. Returns a
    /// low-confidence DNA (empty coverage) when nothing is calibrated yet;
    /// callers must check `confidence` / `cold_start` before acting.
    pub fn categorize(&self, entity_id: Uuid) -> CoreResult<BehavioralDna> {
        let mut dimensions = self.registry.all_current();
        dimensions.sort_by(|a, b| a.name.cmp(&b.name));
        self.composer
            .categorize(entity_id, &dimensions, self.source.as_ref())
    }

    /// Compose an entity's DNA against one explicitly pinned version.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::VersionNotFound` when the version id was never
    /// published.
    pub fn categorize_at_version(
        &self,
        entity_id: Uuid,
        version: Uuid,
    ) -> CoreResult<BehavioralDna> {
        let dimension = self
            .registry
            .by_version(version)
            .ok_or(CoreError::VersionNotFound { version })?;
        self.composer
            .categorize(entity_id, &[dimension], self.source.as_ref())
    }

    // =========================================================================
    // Snapshot capture
    // =========================================================================

    /// Capture the entity's current DNA into the snapshot store.
    ///
    /// Cadence and retention are the scheduler's decision; capture is
    /// idempotent from the drift analyzer's point of view (duplicates for
    /// the same entity/timestamp are tolerated).
    pub async fn snapshot(
        &self,
        entity_id: Uuid,
        retention: RetentionClass,
    ) -> CoreResult<Uuid> {
        let dna = self.categorize(entity_id)?;
        let snapshot = Snapshot::capture(dna, retention);
        let id = self.store.append(snapshot).await?;
        info!(entity = %entity_id, snapshot = %id, %retention, "snapshot captured");
        Ok(id)
    }

    /// Delete snapshots of one retention class older than the cutoff.
    /// Policy (which class, which cutoff) belongs to the caller.
    pub async fn expire_snapshots(
        &self,
        retention: RetentionClass,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<usize> {
        self.store.expire_before(retention, cutoff).await
    }

    // =========================================================================
    // Journey query
    // =========================================================================

    /// Characterize an entity's journey over a time window.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InsufficientHistory` when the window holds fewer
    /// than two snapshots.
    pub async fn get_journey(
        &self,
        entity_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> CoreResult<JourneyView> {
        let range = TimeRange { start, end };
        let snapshots = self.store.history(entity_id, range).await?;
        let journey = self.characterizer.characterize(&snapshots, None)?;
        Ok(JourneyView { snapshots, journey })
    }
}
