//! # Search Orchestrator
//!
//! Fans a search out to every eligible provider and merges what comes
//! back before the deadline.
//!
//! # Flow
//!
//! 1. Validate and normalize the parameters.
//! 2. Ask the [`ProviderRegistry`] for eligible providers. Providers
//!    skipped because their circuit is open are reported with a
//!    `CIRCUIT_OPEN` status and no call is made.
//! 3. Spawn one task per eligible provider, each bounded by the
//!    provider's own timeout and handed a child [`CancellationToken`].
//! 4. Collect results until every task finished or the overall deadline
//!    expires. At the deadline the remaining tasks are cancelled and
//!    recorded as timeouts.
//! 5. Record every outcome exactly once into the provider's breaker and
//!    metrics, then hand the successful results to the
//!    [`ResultAggregator`].
//!
//! At least one success yields a [`SearchResponse`], flagged `degraded`
//! if any provider failed, timed out or was skipped. No success yields
//! [`SearchError::AllProvidersFailed`].
//!
//! Cancelling the caller's token aborts the in-flight calls and returns
//! [`SearchError::Cancelled`] without recording any outcome.

use crate::application::error::{
    AggregateSearchError, ProviderFailure, SearchError, SearchResult,
};
use crate::application::services::provider_registry::{ProviderHandle, ProviderRegistry, Selection};
use crate::application::services::result_aggregator::{
    ProviderStats, ResultAggregator, SearchOptions,
};
use crate::domain::entities::{Airport, FlightOffer};
use crate::domain::value_objects::{
    AirportSearchParams, FlightSearchParams, ProviderFeature, ProviderId, SearchId, SortOption,
};
use crate::infrastructure::providers::error::{AdapterResult, ProviderError, ProviderErrorKind};
use crate::infrastructure::providers::traits::{ProviderAdapter, ProviderResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id as TaskId, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Overall time limit of one search.
    pub deadline_ms: u64,
    /// Sort used when the caller does not pick one.
    pub default_sort: SortOption,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 8_000,
            default_sort: SortOption::Price,
        }
    }
}

impl OrchestratorConfig {
    /// Sets the deadline.
    #[must_use]
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = deadline_ms;
        self
    }
}

/// Outcome of one provider within a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    /// Provider id.
    pub provider: ProviderId,
    /// Whether the provider returned results.
    pub success: bool,
    /// Time spent on the call.
    pub latency_ms: u64,
    /// Offers (or airports) returned before aggregation.
    pub result_count: usize,
    /// Sanitized error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ProviderErrorKind>,
}

impl ProviderStatus {
    fn from_result<T>(result: &ProviderResult<Vec<T>>) -> Self {
        Self {
            provider: result.provider().clone(),
            success: result.is_success(),
            latency_ms: result.duration_ms(),
            result_count: result.data().map_or(0, Vec::len),
            error: result.error().map(ProviderError::public_message),
            error_kind: result.error().map(ProviderError::kind),
        }
    }
}

/// Aggregated flight search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Id of this search, also used in logs.
    pub search_id: SearchId,
    /// The requested page of deduplicated offers.
    pub flights: Vec<FlightOffer>,
    /// Offers in `flights`.
    pub count: usize,
    /// Distinct offers across all pages.
    pub total_count: usize,
    /// One entry per called or circuit-skipped provider, ordered by id.
    pub per_provider_status: Vec<ProviderStatus>,
    /// True if any provider failed, timed out or was skipped.
    pub degraded: bool,
    /// Wall time of the search.
    pub elapsed_ms: u64,
}

/// Merged airport lookup result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AirportSearchResponse {
    /// Airports ordered by IATA code.
    pub airports: Vec<Airport>,
    /// One entry per called or circuit-skipped provider, ordered by id.
    pub per_provider_status: Vec<ProviderStatus>,
    /// True if any provider failed, timed out or was skipped.
    pub degraded: bool,
}

/// Concurrent fan-out over the registry's eligible providers.
#[derive(Debug)]
pub struct SearchOrchestrator {
    registry: Arc<ProviderRegistry>,
    aggregator: ResultAggregator,
    config: OrchestratorConfig,
}

impl SearchOrchestrator {
    /// Creates an orchestrator over `registry`.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, config: OrchestratorConfig) -> Self {
        Self {
            registry,
            aggregator: ResultAggregator::new(),
            config,
        }
    }

    /// Settings in use.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Registry consulted for eligibility.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Searches with the default sort and no paging.
    ///
    /// # Errors
    ///
    /// See [`search_with_cancellation`](Self::search_with_cancellation).
    pub async fn search(&self, params: FlightSearchParams) -> SearchResult<SearchResponse> {
        let options = SearchOptions::sorted_by(self.config.default_sort);
        self.search_with(params, options).await
    }

    /// Searches with explicit sort and paging.
    ///
    /// # Errors
    ///
    /// See [`search_with_cancellation`](Self::search_with_cancellation).
    pub async fn search_with(
        &self,
        params: FlightSearchParams,
        options: SearchOptions,
    ) -> SearchResult<SearchResponse> {
        self.search_with_cancellation(params, options, &CancellationToken::new())
            .await
    }

    /// Searches until done, the deadline expires or `cancel` fires.
    ///
    /// # Errors
    ///
    /// - `SearchError::InvalidParams` if the parameters fail validation
    /// - `SearchError::AllProvidersFailed` if no provider succeeded
    /// - `SearchError::Cancelled` if `cancel` fired first
    pub async fn search_with_cancellation(
        &self,
        params: FlightSearchParams,
        options: SearchOptions,
        cancel: &CancellationToken,
    ) -> SearchResult<SearchResponse> {
        let started = Instant::now();
        let search_id = SearchId::new_v4();
        let params = Arc::new(params.normalized()?);

        let selection = self.registry.select_for_search(ProviderFeature::FlightSearch);
        debug!(
            %search_id,
            origin = params.origin(),
            destination = params.destination(),
            eligible = selection.eligible.len(),
            skipped = selection.skipped.len(),
            "search dispatched"
        );
        let skipped_open = circuit_open_results(&selection);

        let call_params = params.clone();
        let mut results = self
            .fan_out(selection.eligible, cancel, move |adapter, token| {
                let params = call_params.clone();
                async move { adapter.search_flights(&params, &token).await }
            })
            .await?;
        results.extend(skipped_open);
        results.sort_by(|a, b| a.provider().cmp(b.provider()));

        let (per_provider_status, degraded) = summarize(&results)?;

        let stats: HashMap<ProviderId, ProviderStats> = results
            .iter()
            .map(|r| {
                let id = r.provider().clone();
                let stats = ProviderStats {
                    success_rate: self.registry.metrics().success_rate(&id),
                    average_latency_ms: self.registry.metrics().average_latency_ms(&id),
                };
                (id, stats)
            })
            .collect();
        let aggregated = self.aggregator.aggregate(&results, &params, &options, &stats);
        let elapsed_ms = elapsed_ms(started);

        info!(
            %search_id,
            providers = per_provider_status.len(),
            succeeded = per_provider_status.iter().filter(|s| s.success).count(),
            offers = aggregated.total_count,
            degraded,
            elapsed_ms,
            "search complete"
        );

        Ok(SearchResponse {
            search_id,
            count: aggregated.offers.len(),
            flights: aggregated.offers,
            total_count: aggregated.total_count,
            per_provider_status,
            degraded,
            elapsed_ms,
        })
    }

    /// Looks up airports on every provider supporting airport search and
    /// merges them by IATA code.
    ///
    /// # Errors
    ///
    /// Same as flight search.
    pub async fn search_airports(
        &self,
        params: AirportSearchParams,
    ) -> SearchResult<AirportSearchResponse> {
        params.validate()?;
        let selection = self.registry.select_for_search(ProviderFeature::AirportSearch);
        let skipped_open = circuit_open_results(&selection);
        let limit = params.limit();
        let params = Arc::new(params);

        let mut results = self
            .fan_out(selection.eligible, &CancellationToken::new(), move |adapter, token| {
                let params = params.clone();
                async move { adapter.search_airports(&params, &token).await }
            })
            .await?;
        results.extend(skipped_open);
        results.sort_by(|a, b| a.provider().cmp(b.provider()));

        let (per_provider_status, degraded) = summarize(&results)?;

        // first provider in id order wins a duplicate code
        let mut merged: BTreeMap<String, Airport> = BTreeMap::new();
        for airport in results.iter().filter_map(ProviderResult::data).flatten() {
            merged
                .entry(airport.iata_code().to_string())
                .or_insert_with(|| airport.clone());
        }
        let airports = merged.into_values().take(limit).collect();

        Ok(AirportSearchResponse {
            airports,
            per_provider_status,
            degraded,
        })
    }

    /// Calls every handle concurrently. If this future is dropped early,
    /// the spawned calls are aborted with the `JoinSet` and unsettled
    /// handles return their breaker permits on drop.
    async fn fan_out<T, F, Fut>(
        &self,
        handles: Vec<ProviderHandle>,
        cancel: &CancellationToken,
        call: F,
    ) -> SearchResult<Vec<ProviderResult<Vec<T>>>>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn ProviderAdapter>, CancellationToken) -> Fut,
        Fut: Future<Output = AdapterResult<Vec<T>>> + Send + 'static,
    {
        let deadline_ms = self.config.deadline_ms;
        let deadline = Instant::now() + Duration::from_millis(deadline_ms);
        let calls = cancel.child_token();
        let _cancel_calls_on_drop = calls.clone().drop_guard();
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<TaskId, ProviderHandle> = HashMap::with_capacity(handles.len());

        for handle in handles {
            let timeout_ms = handle.timeout_ms();
            let request = call(handle.adapter().clone(), calls.clone());
            let task = tasks.spawn(async move {
                let started = Instant::now();
                let outcome = match tokio::time::timeout(Duration::from_millis(timeout_ms), request).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ProviderError::timeout_with_duration(
                        "provider call exceeded its timeout",
                        timeout_ms,
                    )),
                };
                (outcome, elapsed_ms(started))
            });
            pending.insert(task.id(), handle);
        }

        let mut results = Vec::with_capacity(pending.len());
        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        while !pending.is_empty() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    calls.cancel();
                    tasks.abort_all();
                    for handle in pending.values() {
                        handle.release();
                    }
                    debug!(pending = pending.len(), "search cancelled by caller");
                    return Err(SearchError::Cancelled);
                }
                () = &mut expiry => {
                    calls.cancel();
                    tasks.abort_all();
                    for (_, handle) in pending.drain() {
                        let error = ProviderError::timeout_with_duration("search deadline expired", deadline_ms);
                        warn!(provider = %handle.id(), deadline_ms, "provider still pending at deadline");
                        handle.record_failure(deadline_ms, &error);
                        results.push(ProviderResult::err(handle.id().clone(), error, deadline_ms));
                    }
                }
                Some(joined) = tasks.join_next_with_id() => {
                    let (task_id, outcome, duration_ms) = match joined {
                        Ok((task_id, (outcome, duration_ms))) => (task_id, outcome, duration_ms),
                        Err(join_error) => (
                            join_error.id(),
                            Err(ProviderError::protocol(format!("provider task failed: {join_error}"))),
                            0,
                        ),
                    };
                    let Some(handle) = pending.remove(&task_id) else {
                        continue;
                    };
                    match &outcome {
                        Ok(_) => handle.record_success(duration_ms),
                        Err(error) => {
                            warn!(provider = %handle.id(), duration_ms, error = %error, "provider call failed");
                            handle.record_failure(duration_ms, error);
                        }
                    }
                    results.push(ProviderResult::from_result(handle.id().clone(), outcome, duration_ms));
                }
            }
        }
        Ok(results)
    }
}

fn circuit_open_results<T>(selection: &Selection) -> Vec<ProviderResult<Vec<T>>> {
    selection
        .circuit_open()
        .map(|id| ProviderResult::err(id.clone(), ProviderError::circuit_open(id.clone()), 0))
        .collect()
}

fn summarize<T>(results: &[ProviderResult<Vec<T>>]) -> SearchResult<(Vec<ProviderStatus>, bool)> {
    let statuses: Vec<ProviderStatus> = results.iter().map(ProviderStatus::from_result).collect();
    if !statuses.iter().any(|s| s.success) {
        let failures = results
            .iter()
            .filter_map(|r| r.error().map(|e| ProviderFailure::new(r.provider().clone(), e)))
            .collect();
        return Err(SearchError::AllProvidersFailed(AggregateSearchError::new(failures)));
    }
    let degraded = statuses.iter().any(|s| !s.success);
    Ok((statuses, degraded))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;
    use crate::application::services::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    use crate::application::services::metrics::MetricsCollector;
    use crate::domain::entities::{
        Itinerary, PriceBreakdown, ProviderConfig, ProviderCredentials, ProviderHealth,
        ProviderMetrics, Segment,
    };
    use crate::domain::value_objects::{CurrencyCode, OfferId, Pagination, ProviderType};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    enum Script {
        Offers(Vec<FlightOffer>),
        Fail(ProviderError),
        Stall,
        Panic,
    }

    #[derive(Debug)]
    struct MockProvider {
        id: ProviderId,
        script: Script,
        delay_ms: u64,
        timeout_ms: u64,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(id: &str, script: Script) -> Self {
            Self {
                id: ProviderId::new(id),
                script,
                delay_ms: 0,
                timeout_ms: 5_000,
                calls: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay_ms: u64) -> Self {
            self.delay_ms = delay_ms;
            self
        }

        fn with_timeout(mut self, timeout_ms: u64) -> Self {
            self.timeout_ms = timeout_ms;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockProvider {
        fn provider_id(&self) -> &ProviderId {
            &self.id
        }

        fn timeout_ms(&self) -> u64 {
            self.timeout_ms
        }

        async fn initialize(&self, _credentials: &ProviderCredentials) -> AdapterResult<()> {
            Ok(())
        }

        async fn search_flights(
            &self,
            _params: &FlightSearchParams,
            _cancel: &CancellationToken,
        ) -> AdapterResult<Vec<FlightOffer>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            match &self.script {
                Script::Offers(offers) => Ok(offers.clone()),
                Script::Fail(error) => Err(error.clone()),
                Script::Stall => std::future::pending().await,
                Script::Panic => panic!("adapter bug"),
            }
        }

        async fn search_airports(
            &self,
            params: &AirportSearchParams,
            _cancel: &CancellationToken,
        ) -> AdapterResult<Vec<Airport>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Fail(error) => Err(error.clone()),
                _ => Ok(vec![
                    Airport::new(&params.query()[..3], format!("{} via {}", params.query(), self.id)).unwrap(),
                ]),
            }
        }

        async fn check_health(&self) -> AdapterResult<ProviderHealth> {
            Ok(ProviderHealth::healthy(self.id.clone(), 1))
        }

        fn get_metrics(&self) -> ProviderMetrics {
            ProviderMetrics::default()
        }
    }

    fn offer(provider: &str, flight: &str, price: i64) -> FlightOffer {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let (carrier, number) = flight.split_at(2);
        FlightOffer::new(
            OfferId::new(format!("{provider}-{flight}")),
            ProviderId::new(provider),
            PriceBreakdown::new(Decimal::new(price, 0), Decimal::ZERO, Decimal::ZERO, CurrencyCode::usd()),
            vec![
                Itinerary::new(vec![Segment::new(
                    carrier,
                    number,
                    "JFK",
                    "LAX",
                    day.and_hms_opt(10, 0, 0).unwrap(),
                    day.and_hms_opt(13, 0, 0).unwrap(),
                )])
                .unwrap(),
            ],
        )
        .unwrap()
    }

    fn params() -> FlightSearchParams {
        FlightSearchParams::builder("jfk", "lax", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
            .build()
            .unwrap()
    }

    async fn orchestrator(
        providers: Vec<Arc<MockProvider>>,
        config: OrchestratorConfig,
    ) -> SearchOrchestrator {
        let registry = Arc::new(ProviderRegistry::default());
        for provider in providers {
            let features = [ProviderFeature::FlightSearch, ProviderFeature::AirportSearch];
            let config = ProviderConfig::new(provider.id.clone(), ProviderType::Fixture).with_features(features);
            registry.register_adapter(config, provider).await.unwrap();
        }
        SearchOrchestrator::new(registry, config)
    }

    /// Orchestrator whose breakers cool down after `cooldown_ms`.
    async fn quick_recovery(provider: Arc<MockProvider>, cooldown_ms: u64) -> SearchOrchestrator {
        let registry = Arc::new(ProviderRegistry::new(
            CircuitBreakerConfig::default().with_cooldown_ms(cooldown_ms),
            Arc::new(MetricsCollector::default()),
        ));
        let config = ProviderConfig::new(provider.id.clone(), ProviderType::Fixture);
        registry.register_adapter(config, provider).await.unwrap();
        SearchOrchestrator::new(registry, OrchestratorConfig::default())
    }

    async fn open_circuit(orch: &SearchOrchestrator, id: &ProviderId) {
        for _ in 0..5 {
            let _ = orch.search(params()).await;
        }
        assert_eq!(orch.registry().circuit_state(id), Some(CircuitState::Open));
    }

    mod fan_out {
        use super::*;

        #[tokio::test]
        async fn merges_and_marks_degraded() {
            let a = Arc::new(MockProvider::new("a", Script::Offers(vec![offer("a", "AA123", 200)])));
            let b = Arc::new(MockProvider::new("b", Script::Offers(vec![offer("b", "DL456", 180)])));
            let c = Arc::new(MockProvider::new("c", Script::Fail(ProviderError::upstream("boom", Some(500)))));
            let orch = orchestrator(vec![a, b, c], OrchestratorConfig::default()).await;

            let response = orch.search(params()).await.unwrap();
            assert!(response.degraded);
            assert_eq!(response.count, 2);
            assert_eq!(response.flights[0].provider(), &ProviderId::new("b"));
            let statuses: Vec<_> = response.per_provider_status.iter().map(|s| (s.provider.as_str(), s.success)).collect();
            assert_eq!(statuses, vec![("a", true), ("b", true), ("c", false)]);
            assert_eq!(response.per_provider_status[2].error_kind, Some(ProviderErrorKind::Provider));
        }

        #[tokio::test]
        async fn all_failures_aggregate() {
            let providers = ["a", "b", "c"]
                .into_iter()
                .map(|id| Arc::new(MockProvider::new(id, Script::Fail(ProviderError::connection("refused")))))
                .collect();
            let orch = orchestrator(providers, OrchestratorConfig::default()).await;
            let err = orch.search(params()).await.unwrap_err();
            assert_eq!(err.provider_errors().unwrap().provider_errors.len(), 3);
        }

        #[tokio::test]
        async fn invalid_params_rejected_before_dispatch() {
            let a = Arc::new(MockProvider::new("a", Script::Offers(vec![])));
            let orch = orchestrator(vec![a.clone()], OrchestratorConfig::default()).await;
            let bad: FlightSearchParams = serde_json::from_value(serde_json::json!({
                "origin": "JFK",
                "destination": "JFK",
                "departureDate": "2025-06-01"
            }))
            .unwrap();
            assert!(orch.search(bad).await.unwrap_err().is_client_error());
            assert_eq!(a.calls(), 0);
        }

        #[tokio::test]
        async fn provider_timeout_is_recorded() {
            let slow = Arc::new(MockProvider::new("slow", Script::Stall).with_timeout(30));
            let fast = Arc::new(MockProvider::new("fast", Script::Offers(vec![offer("fast", "AA1", 100)])));
            let orch = orchestrator(vec![slow, fast], OrchestratorConfig::default()).await;
            let response = orch.search(params()).await.unwrap();
            assert!(response.degraded);
            let slow_status = &response.per_provider_status[1];
            assert_eq!(slow_status.error_kind, Some(ProviderErrorKind::Timeout));
            let metrics = orch.registry().metrics().snapshot(&ProviderId::new("slow"));
            assert_eq!(metrics.failed_requests, 1);
        }

        #[tokio::test]
        async fn deadline_bounds_search() {
            let stall = Arc::new(MockProvider::new("stall", Script::Stall).with_timeout(60_000));
            let fast = Arc::new(MockProvider::new("fast", Script::Offers(vec![offer("fast", "AA1", 100)])));
            let orch = orchestrator(vec![stall, fast], OrchestratorConfig::default().with_deadline_ms(100)).await;

            let started = std::time::Instant::now();
            let response = orch.search(params()).await.unwrap();
            assert!(started.elapsed() < Duration::from_millis(600));
            assert!(response.degraded);
            let metrics = orch.registry().metrics().snapshot(&ProviderId::new("stall"));
            assert_eq!(metrics.failed_requests, 1);
            assert_eq!(metrics.total_requests, 1);
        }

        #[tokio::test]
        async fn sort_and_page_applied() {
            let a = Arc::new(MockProvider::new(
                "a",
                Script::Offers(vec![offer("a", "AA1", 300), offer("a", "AA2", 100), offer("a", "AA3", 200)]),
            ));
            let orch = orchestrator(vec![a], OrchestratorConfig::default()).await;
            let options = SearchOptions::sorted_by(SortOption::PriceDesc).with_pagination(Pagination::page(1, 1));
            let response = orch.search_with(params(), options).await.unwrap();
            assert_eq!(response.total_count, 3);
            assert_eq!(response.count, 1);
            assert_eq!(response.flights[0].total_price(), Decimal::new(200, 0));
            assert!(!response.degraded);
        }
    }

    mod circuit {
        use super::*;

        #[tokio::test]
        async fn open_circuit_gets_no_calls() {
            let bad = Arc::new(MockProvider::new("bad", Script::Fail(ProviderError::upstream("down", Some(503)))));
            let good = Arc::new(MockProvider::new("good", Script::Offers(vec![offer("good", "AA1", 100)])));
            let orch = orchestrator(vec![bad.clone(), good], OrchestratorConfig::default()).await;

            for _ in 0..5 {
                orch.search(params()).await.unwrap();
            }
            assert_eq!(bad.calls(), 5);
            assert_eq!(orch.registry().circuit_state(&ProviderId::new("bad")), Some(CircuitState::Open));

            let response = orch.search(params()).await.unwrap();
            assert_eq!(bad.calls(), 5);
            assert!(response.degraded);
            let status = response
                .per_provider_status
                .iter()
                .find(|s| s.provider.as_str() == "bad")
                .unwrap();
            assert_eq!(status.error_kind, Some(ProviderErrorKind::CircuitOpen));
            // skips are not failures
            assert_eq!(orch.registry().metrics().snapshot(&ProviderId::new("bad")).failed_requests, 5);
        }
    }

    mod cancellation {
        use super::*;

        #[tokio::test]
        async fn caller_cancel_returns_promptly_without_recording() {
            let stall = Arc::new(MockProvider::new("stall", Script::Stall));
            let orch = Arc::new(orchestrator(vec![stall], OrchestratorConfig::default()).await);
            let token = CancellationToken::new();

            let task = {
                let orch = orch.clone();
                let token = token.clone();
                tokio::spawn(async move {
                    orch.search_with_cancellation(params(), SearchOptions::default(), &token).await
                })
            };
            tokio::time::sleep(Duration::from_millis(30)).await;
            token.cancel();
            let result = tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
            assert!(matches!(result, Err(SearchError::Cancelled)));
            assert!(orch.registry().metrics().snapshot(&ProviderId::new("stall")).is_empty());
        }

        #[tokio::test]
        async fn caller_cancel_returns_trial_permit() {
            let stall = Arc::new(MockProvider::new("stall", Script::Stall).with_timeout(20));
            let id = ProviderId::new("stall");
            let orch = quick_recovery(stall.clone(), 30).await;
            open_circuit(&orch, &id).await;
            tokio::time::sleep(Duration::from_millis(50)).await;

            let token = CancellationToken::new();
            let search = orch.search_with_cancellation(params(), SearchOptions::default(), &token);
            let cancel = async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                token.cancel();
            };
            let (result, ()) = tokio::join!(search, cancel);
            assert!(matches!(result, Err(SearchError::Cancelled)));
            assert_eq!(orch.registry().circuit_state(&id), Some(CircuitState::HalfOpen));
            assert_eq!(orch.registry().eligible_providers().len(), 1);
        }

        #[tokio::test]
        async fn dropped_search_returns_trial_permit() {
            let stall = Arc::new(MockProvider::new("stall", Script::Stall).with_timeout(20));
            let id = ProviderId::new("stall");
            let orch = quick_recovery(stall.clone(), 30).await;
            open_circuit(&orch, &id).await;
            tokio::time::sleep(Duration::from_millis(50)).await;

            // the serving layer gives up before the provider timeout
            let dropped = tokio::time::timeout(Duration::from_millis(5), orch.search(params())).await;
            assert!(dropped.is_err());
            assert_eq!(stall.calls(), 6);
            assert_eq!(orch.registry().circuit_state(&id), Some(CircuitState::HalfOpen));

            // the slot is free again: the next search runs the trial
            let _ = orch.search(params()).await;
            assert_eq!(stall.calls(), 7);
            assert_eq!(orch.registry().circuit_state(&id), Some(CircuitState::Open));
        }

        #[tokio::test]
        async fn discarded_handles_return_trial_permit() {
            let stall = Arc::new(MockProvider::new("stall", Script::Stall).with_timeout(20));
            let id = ProviderId::new("stall");
            let orch = quick_recovery(stall, 30).await;
            open_circuit(&orch, &id).await;
            tokio::time::sleep(Duration::from_millis(50)).await;

            let handles = orch.registry().eligible_providers();
            assert_eq!(handles.len(), 1);
            assert!(orch.registry().eligible_providers().is_empty());
            drop(handles);
            assert_eq!(orch.registry().eligible_providers().len(), 1);
        }

        #[tokio::test]
        async fn panicking_trial_reopens_circuit() {
            let faulty = Arc::new(MockProvider::new("faulty", Script::Panic));
            let id = ProviderId::new("faulty");
            let orch = quick_recovery(faulty.clone(), 30).await;
            open_circuit(&orch, &id).await;
            tokio::time::sleep(Duration::from_millis(50)).await;

            let err = orch.search(params()).await.unwrap_err();
            let kinds: Vec<_> = err.provider_errors().unwrap().provider_errors.iter().map(|f| f.kind).collect();
            assert_eq!(kinds, vec![ProviderErrorKind::Provider]);
            assert_eq!(faulty.calls(), 6);
            assert_eq!(orch.registry().circuit_state(&id), Some(CircuitState::Open));

            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = orch.search(params()).await;
            assert_eq!(faulty.calls(), 7);
        }
    }

    mod airports {
        use super::*;

        #[tokio::test]
        async fn merges_by_code() {
            let a = Arc::new(MockProvider::new("a", Script::Offers(vec![])));
            let b = Arc::new(MockProvider::new("b", Script::Offers(vec![])).with_delay(5));
            let orch = orchestrator(vec![a, b], OrchestratorConfig::default()).await;
            let response = orch
                .search_airports(AirportSearchParams::new("JFK", 10).unwrap())
                .await
                .unwrap();
            assert_eq!(response.airports.len(), 1);
            assert_eq!(response.airports[0].name(), "JFK via a");
            assert!(!response.degraded);
        }
    }
}
