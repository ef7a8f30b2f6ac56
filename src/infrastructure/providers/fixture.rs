//! # Fixture Flight Provider
//!
//! In-process provider serving a fixed catalogue of offers and airports.
//! Used for sandbox environments, the CLI demo and tests.
//!
//! Configured through [`ProviderConfig`] options:
//!
//! | Option | Type | Meaning |
//! |--------|------|---------|
//! | `offers` | array of offers | catalogue served by `search_flights` |
//! | `offers_file` | path | JSON file holding an array of offers, appended to `offers` |
//! | `airports` | array of airports | catalogue served by `search_airports` |
//! | `latency_ms` | integer | artificial delay before every answer |

use crate::domain::entities::{
    Airport, FlightOffer, ProviderConfig, ProviderCredentials, ProviderHealth, ProviderMetrics,
};
use crate::domain::value_objects::{AirportSearchParams, FlightSearchParams, ProviderId};
use crate::infrastructure::providers::base::AdapterBase;
use crate::infrastructure::providers::error::{AdapterResult, ProviderError};
use crate::infrastructure::providers::traits::ProviderAdapter;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Provider answering from an in-memory catalogue.
#[derive(Debug)]
pub struct FixtureFlightProvider {
    base: AdapterBase,
    offers: Vec<FlightOffer>,
    airports: Vec<Airport>,
    latency: Duration,
    healthy: AtomicBool,
}

impl FixtureFlightProvider {
    /// Creates a fixture serving `offers`, re-attributed to `provider_id`.
    #[must_use]
    pub fn new(provider_id: ProviderId, timeout_ms: u64, offers: Vec<FlightOffer>) -> Self {
        let offers = offers
            .into_iter()
            .map(|o| o.with_provider(provider_id.clone()))
            .collect();
        Self {
            base: AdapterBase::new(provider_id, timeout_ms),
            offers,
            airports: Vec::new(),
            latency: Duration::ZERO,
            healthy: AtomicBool::new(true),
        }
    }

    /// Builds a fixture from the options of `config`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if an option does not decode or
    /// the offers file cannot be read.
    pub fn from_config(config: &ProviderConfig) -> AdapterResult<Self> {
        let mut offers: Vec<FlightOffer> = decode_option(config, "offers")?;
        let offers_file: Option<String> = decode_option(config, "offers_file")?;
        if let Some(path) = offers_file {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                ProviderError::configuration(format!("cannot read offers file {path}: {e}"))
            })?;
            let from_file: Vec<FlightOffer> = serde_json::from_str(&raw).map_err(|e| {
                ProviderError::configuration(format!("offers file {path} is invalid: {e}"))
            })?;
            offers.extend(from_file);
        }
        let airports: Vec<Airport> = decode_option(config, "airports")?;
        let latency_ms: u64 = decode_option(config, "latency_ms")?;
        Ok(Self::new(config.id().clone(), config.timeout_ms(), offers)
            .with_airports(airports)
            .with_latency(Duration::from_millis(latency_ms)))
    }

    /// Sets the airport catalogue.
    #[must_use]
    pub fn with_airports(mut self, airports: Vec<Airport>) -> Self {
        self.airports = airports;
        self
    }

    /// Delays every answer.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Switches the health probe between up and down.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn decode_option<T>(config: &ProviderConfig, key: &str) -> AdapterResult<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match config.option(key) {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            ProviderError::configuration(format!("fixture option '{key}' is invalid: {e}"))
        }),
        None => Ok(T::default()),
    }
}

#[async_trait]
impl ProviderAdapter for FixtureFlightProvider {
    fn provider_id(&self) -> &ProviderId {
        self.base.provider_id()
    }

    fn timeout_ms(&self) -> u64 {
        self.base.timeout_ms()
    }

    async fn initialize(&self, credentials: &ProviderCredentials) -> AdapterResult<()> {
        self.base.mark_ready(credentials.clone());
        Ok(())
    }

    async fn search_flights(
        &self,
        params: &FlightSearchParams,
        cancel: &CancellationToken,
    ) -> AdapterResult<Vec<FlightOffer>> {
        self.base.credentials()?;
        self.base
            .bounded(cancel, async {
                self.simulate_latency().await;
                Ok(self
                    .offers
                    .iter()
                    .filter(|o| {
                        o.itineraries().first().is_some_and(|outbound| {
                            outbound.origin().eq_ignore_ascii_case(params.origin())
                                && outbound.destination().eq_ignore_ascii_case(params.destination())
                                && outbound
                                    .departure_time()
                                    .is_some_and(|t| t.date() == params.departure_date())
                        })
                    })
                    .filter(|o| o.satisfies(params))
                    .cloned()
                    .collect())
            })
            .await
    }

    async fn search_airports(
        &self,
        params: &AirportSearchParams,
        cancel: &CancellationToken,
    ) -> AdapterResult<Vec<Airport>> {
        self.base.credentials()?;
        self.base
            .bounded(cancel, async {
                self.simulate_latency().await;
                Ok(self
                    .airports
                    .iter()
                    .filter(|a| a.matches(params.query()))
                    .take(params.limit())
                    .cloned()
                    .collect())
            })
            .await
    }

    async fn check_health(&self) -> AdapterResult<ProviderHealth> {
        if self.healthy.load(Ordering::Relaxed) {
            let latency = u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX);
            Ok(ProviderHealth::healthy(self.base.provider_id().clone(), latency))
        } else {
            Err(ProviderError::connection("fixture marked unhealthy"))
        }
    }

    fn get_metrics(&self) -> ProviderMetrics {
        self.base.metrics()
    }
}
