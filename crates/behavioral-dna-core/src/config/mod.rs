//! Configuration management for the behavioral DNA core.
//!
//! Algorithm parameters live in explicit structs beside their algorithms
//! ([`CalibrationConfig`], [`DriftConfig`], ...); this module composes them
//! into one loadable [`Config`] so batch jobs are reproducible without code
//! changes. Nothing reads ambient globals: every calibration call receives
//! its parameter set explicitly and records it on the produced artifact.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationConfig;
use crate::drift::DriftConfig;
use crate::error::{CoreError, CoreResult};
use crate::journey::JourneyConfig;
use crate::profile::ProfileConfig;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter directive, e.g. "info" or "behavioral_dna_core=debug".
    pub level: String,
    /// Emit JSON-formatted events instead of human-readable ones.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Calibration pipeline parameters.
    pub calibration: CalibrationConfig,
    /// Profile composition parameters.
    pub profile: ProfileConfig,
    /// Drift classification thresholds.
    pub drift: DriftConfig,
    /// Journey classification thresholds.
    pub journey: JourneyConfig,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Sources, later overriding earlier:
    /// 1. `config/default.toml` (base settings)
    /// 2. `config/{BEHAVIORAL_DNA_ENV}.toml` (environment-specific)
    /// 3. Environment variables with the `BEHAVIORAL_DNA` prefix and `__`
    ///    separator, e.g. `BEHAVIORAL_DNA__CALIBRATION__MIN_POPULATION=200`
    pub fn load() -> CoreResult<Self> {
        let env =
            std::env::var("BEHAVIORAL_DNA_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("BEHAVIORAL_DNA").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| CoreError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> CoreResult<()> {
        self.calibration.validate()?;
        self.profile.validate()?;
        self.drift.validate()?;
        self.journey.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.calibration.min_population, 100);
        assert_eq!(config.calibration.selection.balance_weight, 0.6);
        assert_eq!(config.drift.stable_max, 0.1);
        assert_eq!(config.journey.stable_min_stability, 0.8);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let restored: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [calibration]
            min_population = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.calibration.min_population, 250);
        assert_eq!(config.drift.stable_max, 0.1, "untouched sections keep defaults");
    }
}
