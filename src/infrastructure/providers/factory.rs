//! # Adapter Factory
//!
//! Builds adapters from configuration by dispatching on
//! [`ProviderType`]. Each tag maps to one builder closure; tests and
//! embedders can replace or add builders without touching the core.
//!
//! # Examples
//!
//! ```
//! use flight_aggregator::domain::entities::ProviderConfig;
//! use flight_aggregator::domain::value_objects::{ProviderId, ProviderType};
//! use flight_aggregator::infrastructure::providers::factory::AdapterFactory;
//!
//! let factory = AdapterFactory::with_defaults();
//! let config = ProviderConfig::new(ProviderId::new("demo"), ProviderType::Fixture);
//! let adapter = factory.create(&config).unwrap();
//! assert_eq!(adapter.provider_id().as_str(), "demo");
//! ```

use crate::domain::entities::ProviderConfig;
use crate::domain::value_objects::ProviderType;
use crate::infrastructure::providers::error::{AdapterResult, ProviderError};
use crate::infrastructure::providers::fixture::FixtureFlightProvider;
use crate::infrastructure::providers::rest::RestFlightProvider;
use crate::infrastructure::providers::traits::ProviderAdapter;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds one adapter from its configuration.
pub type AdapterBuilder =
    Arc<dyn Fn(&ProviderConfig) -> AdapterResult<Arc<dyn ProviderAdapter>> + Send + Sync>;

/// Registry of adapter builders keyed by provider type.
#[derive(Clone)]
pub struct AdapterFactory {
    builders: HashMap<ProviderType, AdapterBuilder>,
}

impl AdapterFactory {
    /// A factory with no builders.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// A factory with the built-in REST and fixture adapters.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::empty()
            .register(ProviderType::RestJson, |config| {
                Ok(Arc::new(RestFlightProvider::new(config)) as Arc<dyn ProviderAdapter>)
            })
            .register(ProviderType::Fixture, |config| {
                Ok(Arc::new(FixtureFlightProvider::from_config(config)?) as Arc<dyn ProviderAdapter>)
            })
    }

    /// Registers (or replaces) the builder for `provider_type`.
    #[must_use]
    pub fn register<F>(mut self, provider_type: ProviderType, builder: F) -> Self
    where
        F: Fn(&ProviderConfig) -> AdapterResult<Arc<dyn ProviderAdapter>> + Send + Sync + 'static,
    {
        self.builders.insert(provider_type, Arc::new(builder));
        self
    }

    /// True if a builder exists for `provider_type`.
    #[must_use]
    pub fn supports(&self, provider_type: ProviderType) -> bool {
        self.builders.contains_key(&provider_type)
    }

    /// Builds an uninitialized adapter for `config`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` when no builder is registered
    /// for the type, or the builder's own error.
    pub fn create(&self, config: &ProviderConfig) -> AdapterResult<Arc<dyn ProviderAdapter>> {
        let builder = self.builders.get(&config.provider_type()).ok_or_else(|| {
            ProviderError::configuration(format!(
                "no adapter registered for provider type {}",
                config.provider_type()
            ))
        })?;
        builder(config)
    }
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<String> = self.builders.keys().map(ToString::to_string).collect();
        types.sort();
        f.debug_struct("AdapterFactory").field("types", &types).finish()
    }
}
