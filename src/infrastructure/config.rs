//! # Settings
//!
//! Process configuration loaded with the `config` crate.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults (every section is `#[serde(default)]`)
//! 2. an optional TOML, YAML or JSON file
//! 3. environment variables prefixed `FLIGHT_AGG__`, sections separated
//!    by `__` (e.g. `FLIGHT_AGG__SEARCH__DEADLINE_MS=5000`)
//!
//! # Examples
//!
//! ```
//! use flight_aggregator::infrastructure::config::AppSettings;
//!
//! let settings = AppSettings::from_toml_str(r#"
//!     [search]
//!     deadline_ms = 3000
//!
//!     [[providers]]
//!     id = "sandbox"
//!     provider_type = "fixture"
//! "#).unwrap();
//! assert_eq!(settings.search.deadline_ms, 3000);
//! assert_eq!(settings.providers.len(), 1);
//! ```

use crate::application::services::circuit_breaker::CircuitBreakerConfig;
use crate::application::services::health_monitor::HealthMonitorConfig;
use crate::application::services::metrics::MetricsConfig;
use crate::application::services::search_orchestrator::OrchestratorConfig;
use crate::domain::entities::ProviderConfig;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "FLIGHT_AGG";

/// Settings errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A source could not be read or deserialized.
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// Values were read but are inconsistent.
    #[error("invalid settings: {0}")]
    Invalid(String),

    /// The tracing subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

impl SettingsError {
    /// Creates an invalid-settings error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Result alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Logging.
    pub logging: LoggingSettings,
    /// Search deadline and default sort.
    pub search: OrchestratorConfig,
    /// Breaker thresholds shared by all providers.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Health probe schedule.
    pub health: HealthMonitorConfig,
    /// Metrics window.
    pub metrics: MetricsConfig,
    /// Providers registered at start-up.
    pub providers: Vec<ProviderConfig>,
}

impl AppSettings {
    /// Loads defaults, then `path` if given, then the environment, and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Load` if the file is missing or malformed,
    /// `SettingsError::Invalid` if validation fails.
    pub fn load(path: Option<&Path>) -> SettingsResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses and validates settings from TOML text.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn from_toml_str(toml: &str) -> SettingsResult<Self> {
        let settings: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` naming the first bad value.
    pub fn validate(&self) -> SettingsResult<()> {
        if self.search.deadline_ms == 0 {
            return Err(SettingsError::invalid("search.deadline_ms must be positive"));
        }
        self.circuit_breaker
            .validate()
            .map_err(SettingsError::Invalid)?;
        if self.health.enabled
            && (self.health.interval_ms == 0 || self.health.probe_timeout_ms == 0)
        {
            return Err(SettingsError::invalid(
                "health.interval_ms and health.probe_timeout_ms must be positive",
            ));
        }
        if self.health.suspension_threshold == 0 {
            return Err(SettingsError::invalid(
                "health.suspension_threshold must be at least 1",
            ));
        }
        if self.metrics.window_size == 0 {
            return Err(SettingsError::invalid("metrics.window_size must be at least 1"));
        }

        let mut seen = BTreeSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.id()) {
                return Err(SettingsError::invalid(format!(
                    "duplicate provider id '{}'",
                    provider.id()
                )));
            }
            if provider.timeout_ms() == 0 {
                return Err(SettingsError::invalid(format!(
                    "provider '{}' timeout_ms must be positive",
                    provider.id()
                )));
            }
        }
        Ok(())
    }
}
