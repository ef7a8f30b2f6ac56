//! # Provider Entities
//!
//! Administrative configuration and observed state of external flight-data
//! providers.
//!
//! [`ProviderConfig`] is written by the admin collaborator and only read by
//! the core. [`ProviderHealth`] is written by the health monitor and
//! [`ProviderMetrics`] by the metrics collector.
//!
//! # Examples
//!
//! ```
//! use flight_aggregator::domain::entities::provider::ProviderConfig;
//! use flight_aggregator::domain::value_objects::{ProviderFeature, ProviderId, ProviderType};
//!
//! let config = ProviderConfig::new(ProviderId::new("amadeus"), ProviderType::RestJson)
//!     .with_priority(1)
//!     .with_primary(true);
//!
//! assert!(config.is_active());
//! assert!(config.supports(ProviderFeature::FlightSearch));
//! ```

use crate::domain::value_objects::timestamp::Timestamp;
use crate::domain::value_objects::{ProviderEnvironment, ProviderFeature, ProviderId, ProviderType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Default per-call timeout for a provider.
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5_000;

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_MS
}

fn default_features() -> BTreeSet<ProviderFeature> {
    BTreeSet::from([ProviderFeature::FlightSearch])
}

/// Secrets and endpoint needed to talk to a provider.
///
/// `Debug` output never contains the secret values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCredentials {
    /// API key or client id.
    pub api_key: Option<String>,
    /// API secret or client secret.
    pub api_secret: Option<String>,
    /// Base URL of the provider API.
    pub base_url: Option<String>,
}

impl ProviderCredentials {
    /// Credentials with a key and endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_secret: None,
            base_url: Some(base_url.into()),
        }
    }

    /// Adds a secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.api_secret = Some(secret.into());
        self
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.api_secret.is_none() && self.base_url.is_none()
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Administrative configuration of one provider.
///
/// Field names are snake_case so the same shape loads from config files
/// and environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    id: ProviderId,
    #[serde(default)]
    name: Option<String>,
    provider_type: ProviderType,
    #[serde(default)]
    credentials: ProviderCredentials,
    #[serde(default)]
    environment: ProviderEnvironment,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    is_primary: bool,
    #[serde(default)]
    priority: u32,
    #[serde(default = "default_features")]
    supported_features: BTreeSet<ProviderFeature>,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    /// Adapter-specific settings, opaque to the core.
    #[serde(default)]
    options: BTreeMap<String, serde_json::Value>,
}

impl ProviderConfig {
    /// Creates an active, non-primary config with default features.
    #[must_use]
    pub fn new(id: ProviderId, provider_type: ProviderType) -> Self {
        Self {
            id,
            name: None,
            provider_type,
            credentials: ProviderCredentials::default(),
            environment: ProviderEnvironment::default(),
            is_active: true,
            is_primary: false,
            priority: 0,
            supported_features: default_features(),
            timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            options: BTreeMap::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the environment.
    #[must_use]
    pub fn with_environment(mut self, environment: ProviderEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Activates or deactivates the provider.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Marks the provider as primary.
    #[must_use]
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.is_primary = primary;
        self
    }

    /// Sets the dispatch priority (lower first).
    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Replaces the feature set.
    #[must_use]
    pub fn with_features(mut self, features: impl IntoIterator<Item = ProviderFeature>) -> Self {
        self.supported_features = features.into_iter().collect();
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets one adapter-specific option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Provider id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ProviderId {
        &self.id
    }

    /// Display name, falling back to the id.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.id.as_str())
    }

    /// Adapter type tag.
    #[inline]
    #[must_use]
    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    /// Credentials.
    #[inline]
    #[must_use]
    pub fn credentials(&self) -> &ProviderCredentials {
        &self.credentials
    }

    /// Environment.
    #[inline]
    #[must_use]
    pub fn environment(&self) -> ProviderEnvironment {
        self.environment
    }

    /// Administrative on/off switch.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Primary providers are dispatched first.
    #[inline]
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    /// Dispatch priority (lower first).
    #[inline]
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Supported features.
    #[inline]
    #[must_use]
    pub fn supported_features(&self) -> &BTreeSet<ProviderFeature> {
        &self.supported_features
    }

    /// True if the feature is supported.
    #[must_use]
    pub fn supports(&self, feature: ProviderFeature) -> bool {
        self.supported_features.contains(&feature)
    }

    /// Per-call timeout in milliseconds.
    #[inline]
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Adapter-specific option by key.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&serde_json::Value> {
        self.options.get(key)
    }
}

/// Latest health probe result for a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    provider: ProviderId,
    is_healthy: bool,
    latency_ms: Option<u64>,
    last_checked: Timestamp,
    error_count: u32,
    success_rate: f64,
    message: Option<String>,
}

impl ProviderHealth {
    /// A successful probe.
    #[must_use]
    pub fn healthy(provider: ProviderId, latency_ms: u64) -> Self {
        Self {
            provider,
            is_healthy: true,
            latency_ms: Some(latency_ms),
            last_checked: Timestamp::now(),
            error_count: 0,
            success_rate: 1.0,
            message: None,
        }
    }

    /// A failed probe.
    #[must_use]
    pub fn unhealthy(provider: ProviderId, message: impl Into<String>) -> Self {
        Self {
            provider,
            is_healthy: false,
            latency_ms: None,
            last_checked: Timestamp::now(),
            error_count: 1,
            success_rate: 0.0,
            message: Some(message.into()),
        }
    }

    /// No probe has run yet.
    #[must_use]
    pub fn unknown(provider: ProviderId) -> Self {
        Self {
            provider,
            is_healthy: false,
            latency_ms: None,
            last_checked: Timestamp::now(),
            error_count: 0,
            success_rate: 0.0,
            message: Some("not yet checked".to_string()),
        }
    }

    /// Overrides the counters with values accumulated by the monitor.
    #[must_use]
    pub fn with_stats(mut self, error_count: u32, success_rate: f64) -> Self {
        self.error_count = error_count;
        self.success_rate = success_rate;
        self
    }

    /// Provider id.
    #[inline]
    #[must_use]
    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// Whether the last probe succeeded.
    #[inline]
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }

    /// Probe latency.
    #[inline]
    #[must_use]
    pub fn latency_ms(&self) -> Option<u64> {
        self.latency_ms
    }

    /// When the probe ran.
    #[inline]
    #[must_use]
    pub fn last_checked(&self) -> Timestamp {
        self.last_checked
    }

    /// Consecutive failed probes.
    #[inline]
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Probe success rate.
    #[inline]
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    /// Diagnostic message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for ProviderHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_healthy { "HEALTHY" } else { "UNHEALTHY" };
        write!(f, "ProviderHealth({}: {})", self.provider, status)?;
        if let Some(latency) = self.latency_ms {
            write!(f, " latency={latency}ms")?;
        }
        Ok(())
    }
}

/// Request counters for a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetrics {
    /// Lifetime requests.
    pub total_requests: u64,
    /// Lifetime successes.
    pub successful_requests: u64,
    /// Lifetime failures.
    pub failed_requests: u64,
    /// Mean latency over the sliding window.
    pub average_latency_ms: f64,
    /// Success fraction over the sliding window.
    pub success_rate: f64,
    /// Time of the last recorded request.
    pub last_used: Option<Timestamp>,
}

impl ProviderMetrics {
    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_requests == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod credentials {
        use super::*;

        #[test]
        fn debug_redacts_secrets() {
            let creds = ProviderCredentials::new("key-123", "https://api.example.com")
                .with_secret("s3cr3t");
            let debug = format!("{creds:?}");
            assert!(!debug.contains("key-123"));
            assert!(!debug.contains("s3cr3t"));
            assert!(debug.contains("api.example.com"));
        }

        #[test]
        fn empty_by_default() {
            assert!(ProviderCredentials::default().is_empty());
        }
    }

    mod config {
        use super::*;

        #[test]
        fn deserialize_applies_defaults() {
            let config: ProviderConfig =
                serde_json::from_str(r#"{"id":"p1","provider_type":"fixture"}"#).unwrap();
            assert!(config.is_active());
            assert!(!config.is_primary());
            assert_eq!(config.timeout_ms(), DEFAULT_PROVIDER_TIMEOUT_MS);
            assert!(config.supports(ProviderFeature::FlightSearch));
            assert!(!config.supports(ProviderFeature::AirportSearch));
            assert_eq!(config.name(), "p1");
        }

        #[test]
        fn builder_sets_fields() {
            let config = ProviderConfig::new(ProviderId::new("p"), ProviderType::RestJson)
                .with_name("Provider P")
                .with_features([ProviderFeature::AirportSearch])
                .with_option("latency_ms", serde_json::json!(10));
            assert_eq!(config.name(), "Provider P");
            assert!(config.supports(ProviderFeature::AirportSearch));
            assert_eq!(config.option("latency_ms"), Some(&serde_json::json!(10)));
        }
    }

    mod health {
        use super::*;

        #[test]
        fn constructors() {
            assert!(ProviderHealth::healthy(ProviderId::new("a"), 12).is_healthy());
            let down = ProviderHealth::unhealthy(ProviderId::new("a"), "refused");
            assert!(!down.is_healthy());
            assert_eq!(down.message(), Some("refused"));
            assert!(!ProviderHealth::unknown(ProviderId::new("a")).is_healthy());
        }

        #[test]
        fn display_includes_latency() {
            let display = ProviderHealth::healthy(ProviderId::new("amadeus"), 25).to_string();
            assert!(display.contains("amadeus"));
            assert!(display.contains("25ms"));
        }
    }
}
