//! # Flight Aggregator
//!
//! Searches many flight-data providers at once and merges their offers
//! into one deduplicated, ranked list.
//!
//! Each provider is wrapped by a [`ProviderAdapter`] and guarded by its own
//! [`CircuitBreaker`]. The [`SearchOrchestrator`] calls every eligible
//! provider concurrently under a hard deadline; failures degrade the
//! response instead of failing it. A [`HealthMonitor`] probes providers
//! in the background and suspends those that stay down.
//!
//! # Architecture
//!
//! - [`domain`]: offers, search parameters and provider state, no I/O
//! - [`application`]: breaker, metrics, registry, health monitor,
//!   orchestrator, aggregator and the runtime that wires them
//! - [`infrastructure`]: provider adapters, configuration storage,
//!   settings and logging
//!
//! # Examples
//!
//! ```
//! use flight_aggregator::application::services::{
//!     OrchestratorConfig, ProviderRegistry, SearchOrchestrator,
//! };
//! use flight_aggregator::domain::entities::ProviderConfig;
//! use flight_aggregator::domain::value_objects::{FlightSearchParams, ProviderId, ProviderType};
//! use flight_aggregator::infrastructure::providers::AdapterFactory;
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(ProviderRegistry::default());
//! let config = ProviderConfig::new(ProviderId::new("sandbox"), ProviderType::Fixture);
//! registry.register(config, &AdapterFactory::default()).await.unwrap();
//!
//! let orchestrator = SearchOrchestrator::new(registry, OrchestratorConfig::default());
//! let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
//! let params = FlightSearchParams::builder("JFK", "LAX", date).build().unwrap();
//! let response = orchestrator.search(params).await.unwrap();
//! assert_eq!(response.count, 0);
//! assert!(!response.degraded);
//! # });
//! ```
//!
//! [`ProviderAdapter`]: infrastructure::providers::ProviderAdapter
//! [`CircuitBreaker`]: application::services::CircuitBreaker
//! [`SearchOrchestrator`]: application::services::SearchOrchestrator
//! [`HealthMonitor`]: application::services::HealthMonitor

pub mod application;
pub mod domain;
pub mod infrastructure;
