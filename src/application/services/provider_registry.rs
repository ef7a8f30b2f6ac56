//! # Provider Registry
//!
//! Owns every registered provider: its configuration, adapter, circuit
//! breaker and latest health, and decides which providers a search may
//! use.
//!
//! A provider is eligible when its configuration is active, it carries no
//! [`Deactivation`], it supports the requested feature and its breaker
//! allows a request. The registry is the only writer of health and
//! deactivation state; breakers are written by the outcomes recorded
//! through [`ProviderHandle`].
//!
//! Reads and writes go through a [`DashMap`], so selection can run
//! concurrently with health updates and admin changes. No lock is held
//! while calling into an adapter.

use crate::application::services::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, Permit,
};
use crate::application::services::metrics::MetricsCollector;
use crate::domain::entities::{ProviderConfig, ProviderHealth};
use crate::domain::value_objects::timestamp::Timestamp;
use crate::domain::value_objects::{ProviderFeature, ProviderId};
use crate::infrastructure::persistence::traits::{ProviderConfigRepository, RepositoryResult};
use crate::infrastructure::providers::error::{AdapterResult, ProviderError};
use crate::infrastructure::providers::factory::AdapterFactory;
use crate::infrastructure::providers::traits::ProviderAdapter;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Why a provider is out of rotation regardless of its configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Deactivation {
    /// `initialize` failed; cleared only by a configuration update.
    InitializationFailed {
        /// Sanitized failure message.
        message: String,
    },
    /// Health probes kept failing; lifted by the next successful probe.
    HealthSuspended {
        /// When the suspension started.
        since: Timestamp,
    },
}

impl fmt::Display for Deactivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed { message } => {
                write!(f, "initialization failed: {message}")
            }
            Self::HealthSuspended { since } => write!(f, "suspended by health monitor since {since}"),
        }
    }
}

/// Why a provider was left out of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// `is_active` is false in the configuration.
    Inactive,
    /// The adapter could not be built or initialized.
    InitializationFailed,
    /// Suspended after repeated failed health probes.
    HealthSuspended,
    /// The provider does not support the requested feature.
    Unsupported,
    /// The circuit breaker is open.
    CircuitOpen,
}

/// Breaker permit held by a handle and all its clones.
///
/// Dropped unsettled, it hands the permit back, so a search that is
/// dropped mid-flight never strands a half-open trial slot.
#[derive(Debug)]
struct PermitGuard {
    breaker: Arc<CircuitBreaker>,
    permit: Permit,
    settled: AtomicBool,
}

impl PermitGuard {
    fn new(breaker: Arc<CircuitBreaker>, permit: Permit) -> Self {
        Self {
            breaker,
            permit,
            settled: AtomicBool::new(false),
        }
    }

    fn mark_settled(&self) {
        self.settled.store(true, Ordering::Release);
    }

    fn release(&self) {
        if !self.settled.swap(true, Ordering::AcqRel) {
            self.breaker.release(self.permit);
        }
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        if !*self.settled.get_mut() && self.permit.is_trial() {
            debug!(provider = %self.breaker.provider(), "unsettled trial permit returned");
            self.breaker.release(self.permit);
        }
    }
}

/// Everything a search needs to call one provider and record the outcome.
///
/// The handle carries the breaker permit it was selected with. Clones
/// share it; once the last clone is dropped without an outcome being
/// recorded, the permit goes back to the breaker.
#[derive(Clone)]
pub struct ProviderHandle {
    config: Arc<ProviderConfig>,
    adapter: Arc<dyn ProviderAdapter>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<MetricsCollector>,
    permit: Arc<PermitGuard>,
}

impl ProviderHandle {
    /// Provider id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ProviderId {
        self.config.id()
    }

    /// Configuration the handle was selected with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The adapter to call.
    #[inline]
    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }

    /// The provider's breaker.
    #[inline]
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Permit the handle was selected with.
    #[inline]
    #[must_use]
    pub fn permit(&self) -> Permit {
        self.permit.permit
    }

    /// Per-call timeout of the adapter.
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.adapter.timeout_ms()
    }

    /// Records a successful call into the breaker and metrics.
    pub fn record_success(&self, duration_ms: u64) {
        self.permit.mark_settled();
        self.metrics.record_request(self.id(), duration_ms, true);
        self.breaker.record_success();
    }

    /// Records a failed call. Cancellations only hand back the permit.
    pub fn record_failure(&self, duration_ms: u64, error: &ProviderError) {
        if !error.counts_as_failure() {
            self.permit.release();
            return;
        }
        self.permit.mark_settled();
        self.metrics.record_request(self.id(), duration_ms, false);
        self.breaker.record_failure(error);
    }

    /// Hands back the permit without recording an outcome.
    pub fn release(&self) {
        self.permit.release();
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("provider", self.id())
            .field("state", &self.breaker.state())
            .finish_non_exhaustive()
    }
}

/// Result of choosing providers for one search.
#[derive(Debug, Default)]
pub struct Selection {
    /// Providers to call, in dispatch order.
    pub eligible: Vec<ProviderHandle>,
    /// Providers left out, ordered by id.
    pub skipped: Vec<(ProviderId, SkipReason)>,
}

impl Selection {
    /// Providers skipped because their circuit is open.
    pub fn circuit_open(&self) -> impl Iterator<Item = &ProviderId> {
        self.skipped
            .iter()
            .filter(|(_, reason)| *reason == SkipReason::CircuitOpen)
            .map(|(id, _)| id)
    }
}

/// Health view of one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealthReport {
    /// Provider id.
    pub provider: ProviderId,
    /// Would be used by a search right now.
    pub available: bool,
    /// Adapter built and initialized.
    pub configured: bool,
    /// Breaker state.
    pub circuit: CircuitState,
    /// Last probe or initialization error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Last probe latency, or the live average when no probe ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
}

/// Changes applied by [`ProviderRegistry::sync_from`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Newly registered providers.
    pub added: Vec<ProviderId>,
    /// Providers whose configuration changed.
    pub updated: Vec<ProviderId>,
    /// Providers no longer configured.
    pub removed: Vec<ProviderId>,
}

impl SyncReport {
    /// True if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug)]
struct ProviderEntry {
    config: Arc<ProviderConfig>,
    adapter: Option<Arc<dyn ProviderAdapter>>,
    breaker: Arc<CircuitBreaker>,
    health: Option<ProviderHealth>,
    deactivation: Option<Deactivation>,
    consecutive_probe_failures: u32,
    probes: u64,
    successful_probes: u64,
    last_error: Option<String>,
}

impl ProviderEntry {
    fn skip_reason(&self, feature: ProviderFeature) -> Option<SkipReason> {
        if !self.config.is_active() {
            return Some(SkipReason::Inactive);
        }
        match self.deactivation {
            Some(Deactivation::InitializationFailed { .. }) => {
                return Some(SkipReason::InitializationFailed);
            }
            Some(Deactivation::HealthSuspended { .. }) => {
                return Some(SkipReason::HealthSuspended);
            }
            None => {}
        }
        if self.adapter.is_none() {
            return Some(SkipReason::InitializationFailed);
        }
        if !self.config.supports(feature) {
            return Some(SkipReason::Unsupported);
        }
        None
    }
}

/// Registered providers and their live state.
#[derive(Debug)]
pub struct ProviderRegistry {
    entries: DashMap<ProviderId, ProviderEntry>,
    metrics: Arc<MetricsCollector>,
    breaker_config: CircuitBreakerConfig,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(breaker_config: CircuitBreakerConfig, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            entries: DashMap::new(),
            metrics,
            breaker_config,
        }
    }

    /// Shared metrics collector.
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the adapter for `config` with `factory` and registers it.
    ///
    /// The provider is stored even when building or initializing fails;
    /// it is then deactivated with [`Deactivation::InitializationFailed`]
    /// until a later configuration update succeeds.
    ///
    /// # Errors
    ///
    /// Returns the build or `initialize` error.
    pub async fn register(&self, config: ProviderConfig, factory: &AdapterFactory) -> AdapterResult<()> {
        match factory.create(&config) {
            Ok(adapter) => self.register_adapter(config, adapter).await,
            Err(error) => {
                self.store(config, None, Some(&error));
                Err(error)
            }
        }
    }

    /// Initializes `adapter` with the credentials of `config` and registers it.
    ///
    /// Re-registering an existing id replaces its configuration and adapter
    /// but keeps its circuit breaker.
    ///
    /// # Errors
    ///
    /// Returns the `initialize` error; the provider is stored deactivated.
    pub async fn register_adapter(
        &self,
        config: ProviderConfig,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> AdapterResult<()> {
        let result = adapter.initialize(config.credentials()).await;
        self.store(config, Some(adapter), result.as_ref().err());
        result
    }

    fn store(
        &self,
        config: ProviderConfig,
        adapter: Option<Arc<dyn ProviderAdapter>>,
        init_error: Option<&ProviderError>,
    ) {
        let id = config.id().clone();
        let breaker = self
            .entries
            .get(&id)
            .map(|e| e.breaker.clone())
            .unwrap_or_else(|| Arc::new(CircuitBreaker::new(id.clone(), self.breaker_config.clone())));
        let deactivation = init_error.map(|e| Deactivation::InitializationFailed {
            message: e.public_message(),
        });
        match &deactivation {
            Some(reason) => warn!(provider = %id, %reason, "provider registered inactive"),
            None => info!(
                provider = %id,
                provider_type = %config.provider_type(),
                primary = config.is_primary(),
                priority = config.priority(),
                "provider registered"
            ),
        }
        let entry = ProviderEntry {
            config: Arc::new(config),
            adapter,
            breaker,
            health: None,
            last_error: deactivation.as_ref().map(ToString::to_string),
            deactivation,
            consecutive_probe_failures: 0,
            probes: 0,
            successful_probes: 0,
        };
        self.entries.insert(id, entry);
    }

    /// Unregisters a provider. Returns true if it existed.
    pub fn remove(&self, id: &ProviderId) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            self.metrics.remove(id);
            info!(provider = %id, "provider removed");
        }
        removed
    }

    /// Chooses the providers a search for `feature` may call.
    ///
    /// Takes a permit from every breaker that grants one. Each eligible
    /// handle holds its permit until an outcome is recorded, it is
    /// released, or the handle is dropped.
    #[must_use]
    pub fn select_for_search(&self, feature: ProviderFeature) -> Selection {
        let mut candidates = Vec::new();
        let mut skipped = Vec::new();
        for entry in &self.entries {
            match (entry.skip_reason(feature), &entry.adapter) {
                (None, Some(adapter)) => candidates.push((
                    entry.config.clone(),
                    adapter.clone(),
                    entry.breaker.clone(),
                )),
                (reason, _) => skipped.push((
                    entry.key().clone(),
                    reason.unwrap_or(SkipReason::InitializationFailed),
                )),
            }
        }

        // Map guards are released; breakers lock independently.
        let mut eligible = Vec::with_capacity(candidates.len());
        for (config, adapter, breaker) in candidates {
            match breaker.try_acquire() {
                Some(permit) => eligible.push(ProviderHandle {
                    config,
                    adapter,
                    permit: Arc::new(PermitGuard::new(breaker.clone(), permit)),
                    breaker,
                    metrics: self.metrics.clone(),
                }),
                None => {
                    debug!(provider = %config.id(), "circuit open, provider skipped");
                    skipped.push((config.id().clone(), SkipReason::CircuitOpen));
                }
            }
        }

        eligible.sort_by(|a, b| {
            b.config
                .is_primary()
                .cmp(&a.config.is_primary())
                .then_with(|| a.config.priority().cmp(&b.config.priority()))
                .then_with(|| a.id().cmp(b.id()))
        });
        skipped.sort_by(|a, b| a.0.cmp(&b.0));
        Selection { eligible, skipped }
    }

    /// Providers eligible for flight search, in dispatch order.
    ///
    /// Same permit semantics as [`select_for_search`](Self::select_for_search):
    /// discarding the handles returns their permits.
    #[must_use]
    pub fn eligible_providers(&self) -> Vec<ProviderHandle> {
        self.select_for_search(ProviderFeature::FlightSearch).eligible
    }

    /// Adapters the health monitor should probe: active and initialized,
    /// including health-suspended ones so they can recover.
    #[must_use]
    pub fn health_targets(&self) -> Vec<(ProviderId, Arc<dyn ProviderAdapter>)> {
        let mut targets: Vec<_> = self
            .entries
            .iter()
            .filter(|e| {
                e.config.is_active()
                    && !matches!(e.deactivation, Some(Deactivation::InitializationFailed { .. }))
            })
            .filter_map(|e| e.adapter.clone().map(|a| (e.key().clone(), a)))
            .collect();
        targets.sort_by(|a, b| a.0.cmp(&b.0));
        targets
    }

    /// Stores a probe outcome for `id`.
    ///
    /// After `suspension_threshold` consecutive failures the provider is
    /// suspended; the next successful probe lifts the suspension.
    pub fn apply_probe(
        &self,
        id: &ProviderId,
        outcome: AdapterResult<ProviderHealth>,
        suspension_threshold: u32,
    ) {
        let Some(mut entry) = self.entries.get_mut(id) else {
            return;
        };
        entry.probes += 1;
        let healthy = match outcome {
            Ok(health) if health.is_healthy() => {
                entry.successful_probes += 1;
                entry.consecutive_probe_failures = 0;
                entry.health = Some(health);
                true
            }
            Ok(health) => {
                entry.consecutive_probe_failures += 1;
                entry.last_error = health.message().map(str::to_string);
                entry.health = Some(health);
                false
            }
            Err(error) => {
                entry.consecutive_probe_failures += 1;
                let message = error.public_message();
                entry.last_error = Some(message.clone());
                entry.health = Some(ProviderHealth::unhealthy(id.clone(), message));
                false
            }
        };

        let rate = entry.successful_probes as f64 / entry.probes as f64;
        let failures = entry.consecutive_probe_failures;
        entry.health = entry.health.take().map(|h| h.with_stats(failures, rate));

        if healthy {
            if matches!(entry.deactivation, Some(Deactivation::HealthSuspended { .. })) {
                entry.deactivation = None;
                info!(provider = %id, "health restored, provider back in rotation");
            }
            debug!(provider = %id, "health probe ok");
        } else if failures >= suspension_threshold && entry.deactivation.is_none() {
            entry.deactivation = Some(Deactivation::HealthSuspended {
                since: Timestamp::now(),
            });
            warn!(provider = %id, consecutive_failures = failures, "provider suspended after failed health probes");
        } else {
            warn!(provider = %id, consecutive_failures = failures, error = ?entry.last_error, "health probe failed");
        }
    }

    /// Configuration of `id`.
    #[must_use]
    pub fn config(&self, id: &ProviderId) -> Option<ProviderConfig> {
        self.entries.get(id).map(|e| e.config.as_ref().clone())
    }

    /// Latest probe result of `id`.
    #[must_use]
    pub fn health(&self, id: &ProviderId) -> Option<ProviderHealth> {
        self.entries.get(id).and_then(|e| e.health.clone())
    }

    /// Deactivation of `id`, if any.
    #[must_use]
    pub fn deactivation(&self, id: &ProviderId) -> Option<Deactivation> {
        self.entries.get(id).and_then(|e| e.deactivation.clone())
    }

    /// Breaker state of `id` without taking a permit.
    #[must_use]
    pub fn circuit_state(&self, id: &ProviderId) -> Option<CircuitState> {
        self.entries.get(id).map(|e| e.breaker.state())
    }

    /// Availability summary for every provider, ordered by id.
    #[must_use]
    pub fn provider_health_report(&self) -> Vec<ProviderHealthReport> {
        let mut report: Vec<_> = self
            .entries
            .iter()
            .map(|e| {
                let circuit = e.breaker.state();
                let configured = e.adapter.is_some()
                    && !matches!(e.deactivation, Some(Deactivation::InitializationFailed { .. }));
                let available = configured
                    && e.config.is_active()
                    && e.deactivation.is_none()
                    && circuit != CircuitState::Open;
                let response_time = e.health.as_ref().and_then(ProviderHealth::latency_ms).or_else(|| {
                    let avg = self.metrics.average_latency_ms(e.key());
                    (avg > 0.0).then(|| avg.round() as u64)
                });
                ProviderHealthReport {
                    provider: e.key().clone(),
                    available,
                    configured,
                    circuit,
                    last_error: e.last_error.clone(),
                    response_time,
                }
            })
            .collect();
        report.sort_by(|a, b| a.provider.cmp(&b.provider));
        report
    }

    /// Applies the configurations stored in `repository`: registers new
    /// ones, re-registers changed ones and removes those that disappeared.
    ///
    /// Initialization failures are logged and leave the provider
    /// deactivated; they do not abort the sync.
    ///
    /// # Errors
    ///
    /// Returns the repository error if configurations cannot be read.
    pub async fn sync_from(
        &self,
        repository: &dyn ProviderConfigRepository,
        factory: &AdapterFactory,
    ) -> RepositoryResult<SyncReport> {
        let configs = repository.get_all().await?;
        let wanted: BTreeSet<ProviderId> = configs.iter().map(|c| c.id().clone()).collect();
        let mut report = SyncReport::default();

        for config in configs {
            let id = config.id().clone();
            let existing = self.entries.get(&id).map(|e| e.config.clone());
            match existing {
                Some(current) if *current == config => continue,
                Some(_) => report.updated.push(id.clone()),
                None => report.added.push(id.clone()),
            }
            if let Err(error) = self.register(config, factory).await {
                warn!(provider = %id, error = %error, "provider failed to initialize during sync");
            }
        }

        let stale: Vec<ProviderId> = self
            .entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|id| !wanted.contains(id))
            .collect();
        for id in stale {
            if self.remove(&id) {
                report.removed.push(id);
            }
        }

        if !report.is_empty() {
            info!(
                added = report.added.len(),
                updated = report.updated.len(),
                removed = report.removed.len(),
                "provider configuration synced"
            );
        }
        Ok(report)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default(), Arc::new(MetricsCollector::default()))
    }
}
