//! End-to-end search scenarios through the registry, orchestrator and
//! runtime, using scripted and fixture providers.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use async_trait::async_trait;
use chrono::NaiveDate;
use flight_aggregator::application::AggregatorRuntime;
use flight_aggregator::application::services::{
    CircuitBreakerConfig, CircuitState, MetricsCollector, OrchestratorConfig, ProviderRegistry,
    SearchOptions, SearchOrchestrator,
};
use flight_aggregator::domain::entities::{
    Airport, FlightOffer, Itinerary, PriceBreakdown, ProviderConfig, ProviderCredentials,
    ProviderHealth, ProviderMetrics, Segment,
};
use flight_aggregator::domain::value_objects::{
    AirportSearchParams, CurrencyCode, FlightSearchParams, OfferId, ProviderId, ProviderType,
};
use flight_aggregator::infrastructure::config::AppSettings;
use flight_aggregator::infrastructure::providers::{
    AdapterFactory, AdapterResult, ProviderAdapter, ProviderError, ProviderErrorKind,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Reply {
    Offers(Vec<FlightOffer>),
    Fail(ProviderError),
    Hang,
}

/// Provider answering from a script, counting calls.
#[derive(Debug)]
struct ScriptedProvider {
    id: ProviderId,
    reply: parking_lot::Mutex<Reply>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(id: &str, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::new(id),
            reply: parking_lot::Mutex::new(reply),
            calls: AtomicUsize::new(0),
        })
    }

    fn set_reply(&self, reply: Reply) {
        *self.reply.lock() = reply;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    fn timeout_ms(&self) -> u64 {
        60_000
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
        let reply = self.reply.lock().clone();
        match reply {
            Reply::Offers(offers) => Ok(offers),
            Reply::Fail(error) => Err(error),
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn search_airports(
        &self,
        _params: &AirportSearchParams,
        _cancel: &CancellationToken,
    ) -> AdapterResult<Vec<Airport>> {
        Ok(vec![])
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
                day.and_hms_opt(13, 30, 0).unwrap(),
            )])
            .unwrap(),
        ],
    )
    .unwrap()
}

fn params() -> FlightSearchParams {
    FlightSearchParams::builder("JFK", "LAX", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
        .build()
        .unwrap()
}

fn flight_of(offer: &FlightOffer) -> String {
    let segment = &offer.itineraries()[0].segments()[0];
    format!("{}{}", segment.carrier_code(), segment.flight_number())
}

async fn orchestrator_with(
    providers: &[Arc<ScriptedProvider>],
    breaker: CircuitBreakerConfig,
    config: OrchestratorConfig,
) -> SearchOrchestrator {
    let registry = Arc::new(ProviderRegistry::new(breaker, Arc::new(MetricsCollector::default())));
    for provider in providers {
        let config = ProviderConfig::new(provider.id.clone(), ProviderType::Fixture);
        registry
            .register_adapter(config, provider.clone())
            .await
            .unwrap();
    }
    SearchOrchestrator::new(registry, config)
}

#[tokio::test]
async fn one_of_three_failing_degrades_response() {
    let providers = [
        ScriptedProvider::new("a", Reply::Offers(vec![offer("a", "UA10", 250), offer("a", "UA11", 150)])),
        ScriptedProvider::new("b", Reply::Offers(vec![offer("b", "B612", 199)])),
        ScriptedProvider::new("c", Reply::Fail(ProviderError::rate_limited("slow down"))),
    ];
    let orch = orchestrator_with(&providers, CircuitBreakerConfig::default(), OrchestratorConfig::default()).await;

    let response = orch.search(params()).await.unwrap();

    assert!(response.degraded);
    let flights: Vec<_> = response.flights.iter().map(flight_of).collect();
    assert_eq!(flights, vec!["UA11", "B612", "UA10"]);
    assert!(response.flights.iter().all(|o| o.provider().as_str() != "c"));
    let failed: Vec<_> = response
        .per_provider_status
        .iter()
        .filter(|s| !s.success)
        .map(|s| s.provider.as_str())
        .collect();
    assert_eq!(failed, vec!["c"]);
}

#[tokio::test]
async fn all_three_failing_is_aggregate_error() {
    let providers = [
        ScriptedProvider::new("a", Reply::Fail(ProviderError::upstream("bad gateway", Some(502)))),
        ScriptedProvider::new("b", Reply::Fail(ProviderError::timeout("slow"))),
        ScriptedProvider::new("c", Reply::Fail(ProviderError::invalid_request("bad route"))),
    ];
    let orch = orchestrator_with(&providers, CircuitBreakerConfig::default(), OrchestratorConfig::default()).await;

    let err = orch.search(params()).await.unwrap_err();
    let aggregate = err.provider_errors().unwrap();
    assert_eq!(aggregate.provider_errors.len(), 3);
    let json = serde_json::to_value(aggregate).unwrap();
    assert_eq!(json["providerErrors"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn duplicate_flight_merged_with_alternate() {
    let providers = [
        ScriptedProvider::new("a", Reply::Offers(vec![offer("a", "AA123", 200)])),
        ScriptedProvider::new("b", Reply::Offers(vec![offer("b", "AA123", 200)])),
        ScriptedProvider::new("c", Reply::Offers(vec![offer("c", "DL456", 180)])),
    ];
    let orch = orchestrator_with(&providers, CircuitBreakerConfig::default(), OrchestratorConfig::default()).await;

    let response = orch.search(params()).await.unwrap();

    assert_eq!(response.count, 2);
    let flights: Vec<_> = response.flights.iter().map(flight_of).collect();
    assert_eq!(flights, vec!["DL456", "AA123"]);
    let aa = &response.flights[1];
    assert_eq!(aa.total_price(), Decimal::new(200, 0));
    let alternates = aa.alternate_providers();
    assert_eq!(alternates.len(), 1);
    let mut sources = vec![aa.provider().as_str(), alternates[0].provider.as_str()];
    sources.sort_unstable();
    assert_eq!(sources, vec!["a", "b"]);
    assert_eq!(alternates[0].total_price, Decimal::new(200, 0));
    assert!(!response.degraded);
}

#[tokio::test]
async fn open_circuit_receives_no_calls_until_cooldown() {
    let flaky = ScriptedProvider::new("flaky", Reply::Fail(ProviderError::connection("refused")));
    let steady = ScriptedProvider::new("steady", Reply::Offers(vec![offer("steady", "AA1", 100)]));
    let breaker = CircuitBreakerConfig::default().with_cooldown_ms(150);
    let orch = orchestrator_with(&[flaky.clone(), steady], breaker, OrchestratorConfig::default()).await;

    for _ in 0..5 {
        orch.search(params()).await.unwrap();
    }
    assert_eq!(flaky.calls(), 5);

    for _ in 0..3 {
        let response = orch.search(params()).await.unwrap();
        let status = response
            .per_provider_status
            .iter()
            .find(|s| s.provider.as_str() == "flaky")
            .unwrap();
        assert_eq!(status.error_kind, Some(ProviderErrorKind::CircuitOpen));
    }
    assert_eq!(flaky.calls(), 5);

    // cooldown elapses: one trial goes through and closes the circuit
    tokio::time::sleep(Duration::from_millis(200)).await;
    flaky.set_reply(Reply::Offers(vec![offer("flaky", "AA2", 90)]));
    let response = orch.search(params()).await.unwrap();
    assert_eq!(flaky.calls(), 6);
    assert!(!response.degraded);
    assert_eq!(
        orch.registry().circuit_state(&ProviderId::new("flaky")),
        Some(CircuitState::Closed)
    );
}

#[tokio::test]
async fn failed_trial_reopens_circuit() {
    let flaky = ScriptedProvider::new("flaky", Reply::Fail(ProviderError::connection("refused")));
    let steady = ScriptedProvider::new("steady", Reply::Offers(vec![offer("steady", "AA1", 100)]));
    let breaker = CircuitBreakerConfig::default().with_cooldown_ms(100);
    let orch = orchestrator_with(&[flaky.clone(), steady], breaker, OrchestratorConfig::default()).await;

    for _ in 0..5 {
        orch.search(params()).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(150)).await;
    orch.search(params()).await.unwrap();
    assert_eq!(flaky.calls(), 6);
    assert_eq!(
        orch.registry().circuit_state(&ProviderId::new("flaky")),
        Some(CircuitState::Open)
    );
    orch.search(params()).await.unwrap();
    assert_eq!(flaky.calls(), 6);
}

#[tokio::test]
async fn abandoned_trial_search_does_not_strand_provider() {
    let flaky = ScriptedProvider::new("flaky", Reply::Fail(ProviderError::connection("refused")));
    let steady = ScriptedProvider::new("steady", Reply::Offers(vec![offer("steady", "AA1", 100)]));
    let breaker = CircuitBreakerConfig::default().with_cooldown_ms(50);
    let orch = orchestrator_with(&[flaky.clone(), steady], breaker, OrchestratorConfig::default()).await;
    let id = ProviderId::new("flaky");

    for _ in 0..5 {
        orch.search(params()).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(80)).await;

    // the trial call hangs and the caller gives up on the whole search
    flaky.set_reply(Reply::Hang);
    let abandoned = tokio::time::timeout(Duration::from_millis(30), orch.search(params())).await;
    assert!(abandoned.is_err());
    assert_eq!(flaky.calls(), 6);
    assert_eq!(orch.registry().circuit_state(&id), Some(CircuitState::HalfOpen));

    flaky.set_reply(Reply::Offers(vec![offer("flaky", "AA2", 90)]));
    let response = orch.search(params()).await.unwrap();
    assert_eq!(flaky.calls(), 7);
    assert!(!response.degraded);
    assert_eq!(orch.registry().circuit_state(&id), Some(CircuitState::Closed));
}

#[tokio::test]
async fn deadline_holds_against_hanging_provider() {
    let hanging = ScriptedProvider::new("hanging", Reply::Hang);
    let quick = ScriptedProvider::new("quick", Reply::Offers(vec![offer("quick", "AA1", 100)]));
    let config = OrchestratorConfig::default().with_deadline_ms(150);
    let orch = orchestrator_with(&[hanging, quick], CircuitBreakerConfig::default(), config).await;

    let started = Instant::now();
    let response = orch.search(params()).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(140), "returned before deadline: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1_000), "deadline exceeded: {elapsed:?}");
    assert!(response.degraded);
    let hanging_status = &response.per_provider_status[0];
    assert_eq!(hanging_status.error_kind, Some(ProviderErrorKind::Timeout));
}

#[tokio::test]
async fn deadline_with_only_hanging_providers_fails_in_time() {
    let providers = [ScriptedProvider::new("h1", Reply::Hang), ScriptedProvider::new("h2", Reply::Hang)];
    let config = OrchestratorConfig::default().with_deadline_ms(100);
    let orch = orchestrator_with(&providers, CircuitBreakerConfig::default(), config).await;

    let started = Instant::now();
    let err = orch.search(params()).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(1_000));
    let kinds: Vec<_> = err
        .provider_errors()
        .unwrap()
        .provider_errors
        .iter()
        .map(|f| f.kind)
        .collect();
    assert_eq!(kinds, vec![ProviderErrorKind::Timeout, ProviderErrorKind::Timeout]);
}

#[tokio::test]
async fn success_rate_tracks_scripted_outcomes() {
    let provider = ScriptedProvider::new("p", Reply::Offers(vec![]));
    let backup = ScriptedProvider::new("backup", Reply::Offers(vec![]));
    let orch = orchestrator_with(&[provider.clone(), backup], CircuitBreakerConfig::default(), OrchestratorConfig::default()).await;

    // 4 successes, 3 failures, interleaved so the breaker never opens
    let script = [true, false, true, false, true, false, true];
    for ok in script {
        let reply = if ok {
            Reply::Offers(vec![])
        } else {
            Reply::Fail(ProviderError::upstream("flap", Some(500)))
        };
        provider.set_reply(reply);
        orch.search(params()).await.unwrap();
    }

    let metrics = orch.registry().metrics().snapshot(&ProviderId::new("p"));
    assert_eq!(metrics.total_requests, 7);
    assert_eq!(metrics.successful_requests, 4);
    assert!((metrics.success_rate - 4.0 / 7.0).abs() < 1e-9);
}

#[tokio::test]
async fn runtime_serves_fixture_providers_from_settings() {
    let catalogue = serde_json::to_value(vec![offer("x", "AA123", 200), offer("x", "DL456", 180)]).unwrap();
    let mut settings = AppSettings::default();
    settings.health.enabled = false;
    settings.providers = vec![
        ProviderConfig::new(ProviderId::new("sandbox-a"), ProviderType::Fixture)
            .with_primary(true)
            .with_option("offers", catalogue.clone()),
        ProviderConfig::new(ProviderId::new("sandbox-b"), ProviderType::Fixture)
            .with_option("offers", catalogue),
    ];
    let runtime = AggregatorRuntime::from_settings(&settings, AdapterFactory::default())
        .await
        .unwrap();

    let response = runtime.search(params(), SearchOptions::default()).await.unwrap();
    assert_eq!(response.count, 2);
    assert_eq!(flight_of(&response.flights[0]), "DL456");
    assert_eq!(response.flights[0].alternate_providers().len(), 1);

    let report = runtime.check_provider_health();
    assert!(report.iter().all(|r| r.configured));
    runtime.shutdown().await;
}
