//! # Provider Adapter Trait
//!
//! Port definition for flight-data provider integrations.
//!
//! Each external provider is wrapped by one [`ProviderAdapter`]. Adapters
//! are selected by [`ProviderType`](crate::domain::value_objects::ProviderType)
//! through the [`AdapterFactory`](super::factory::AdapterFactory) rather than
//! a type hierarchy, so integrations share no mutable state.
//!
//! Calls made by the orchestrator are collected into a [`ProviderResult`]
//! envelope.
//!
//! # Examples
//!
//! ```ignore
//! use flight_aggregator::infrastructure::providers::traits::ProviderAdapter;
//!
//! #[derive(Debug)]
//! struct MyGds { /* ... */ }
//!
//! #[async_trait::async_trait]
//! impl ProviderAdapter for MyGds {
//!     // ... implement required methods
//! }
//! ```

use crate::domain::entities::{Airport, FlightOffer, ProviderCredentials, ProviderHealth, ProviderMetrics};
use crate::domain::value_objects::timestamp::Timestamp;
use crate::domain::value_objects::{AirportSearchParams, FlightSearchParams, ProviderId};
use crate::infrastructure::providers::error::{AdapterResult, ProviderError};
use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Outcome of one adapter invocation as seen by the orchestrator.
#[derive(Debug, Clone)]
pub struct ProviderResult<T> {
    success: bool,
    data: Option<T>,
    error: Option<ProviderError>,
    provider: ProviderId,
    timestamp: Timestamp,
    duration_ms: u64,
    cached: bool,
}

impl<T> ProviderResult<T> {
    /// A successful call.
    #[must_use]
    pub fn ok(provider: ProviderId, data: T, duration_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            provider,
            timestamp: Timestamp::now(),
            duration_ms,
            cached: false,
        }
    }

    /// A failed or skipped call.
    #[must_use]
    pub fn err(provider: ProviderId, error: ProviderError, duration_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            provider,
            timestamp: Timestamp::now(),
            duration_ms,
            cached: false,
        }
    }

    /// Wraps an adapter result.
    #[must_use]
    pub fn from_result(provider: ProviderId, result: AdapterResult<T>, duration_ms: u64) -> Self {
        match result {
            Ok(data) => Self::ok(provider, data, duration_ms),
            Err(error) => Self::err(provider, error, duration_ms),
        }
    }

    /// Marks the data as served from a cache.
    #[must_use]
    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    /// Whether the call succeeded.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Returned data.
    #[inline]
    #[must_use]
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Consumes the envelope, returning the data.
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Failure detail.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&ProviderError> {
        self.error.as_ref()
    }

    /// Provider that was called.
    #[inline]
    #[must_use]
    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// When the outcome was recorded.
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Wall time of the call.
    #[inline]
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Whether the data came from a cache.
    #[inline]
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cached
    }
}

/// Trait defining the interface for provider adapters.
///
/// # Timeouts and cancellation
///
/// `search_flights` must give up after [`timeout_ms`](Self::timeout_ms)
/// with `ProviderError::Timeout`, and return `ProviderError::Cancelled`
/// promptly once `cancel` fires. The orchestrator's overall deadline is
/// enforced independently.
///
/// # Error Handling
///
/// Implementations map provider-specific failures to [`ProviderError`]
/// variants; credential problems are `ProviderError::Configuration`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + fmt::Debug {
    /// Returns the provider ID.
    fn provider_id(&self) -> &ProviderId;

    /// Returns the per-call timeout in milliseconds.
    fn timeout_ms(&self) -> u64;

    /// Validates and stores credentials.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Configuration` - Missing or malformed credentials
    async fn initialize(&self, credentials: &ProviderCredentials) -> AdapterResult<()>;

    /// Searches for offers honouring every constraint in `params`.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Timeout` - Per-call timeout elapsed
    /// - `ProviderError::Cancelled` - `cancel` fired
    /// - `ProviderError::Configuration` - Called before a successful `initialize`
    /// - Any provider-side failure variant
    async fn search_flights(
        &self,
        params: &FlightSearchParams,
        cancel: &CancellationToken,
    ) -> AdapterResult<Vec<FlightOffer>>;

    /// Looks up airports matching a free-text query.
    ///
    /// # Errors
    ///
    /// Same as [`search_flights`](Self::search_flights).
    async fn search_airports(
        &self,
        params: &AirportSearchParams,
        cancel: &CancellationToken,
    ) -> AdapterResult<Vec<Airport>>;

    /// Performs a cheap liveness probe without touching search traffic.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Timeout` - Probe timed out
    /// - `ProviderError::Connection` - Provider unreachable
    async fn check_health(&self) -> AdapterResult<ProviderHealth>;

    /// Returns locally accumulated counters without blocking.
    fn get_metrics(&self) -> ProviderMetrics;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope() {
        let result = ProviderResult::ok(ProviderId::new("a"), vec![1, 2], 40);
        assert!(result.is_success());
        assert!(result.error().is_none());
        assert_eq!(result.duration_ms(), 40);
        assert!(!result.is_cached());
        assert_eq!(result.into_data().unwrap().len(), 2);
    }

    #[test]
    fn err_envelope() {
        let result: ProviderResult<Vec<u8>> =
            ProviderResult::from_result(ProviderId::new("b"), Err(ProviderError::timeout("slow")), 5000);
        assert!(!result.is_success());
        assert!(result.data().is_none());
        assert_eq!(result.provider(), &ProviderId::new("b"));
    }

    #[test]
    fn cached_flag() {
        let result = ProviderResult::ok(ProviderId::new("a"), (), 0).with_cached(true);
        assert!(result.is_cached());
    }
}
