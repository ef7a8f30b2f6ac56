//! # Application Services
//!
//! The aggregation core, leaves first:
//! - [`MetricsCollector`]: per-provider request counters
//! - [`CircuitBreaker`]: per-provider failure isolation
//! - [`ProviderRegistry`]: configuration, adapters and eligibility
//! - [`HealthMonitor`]: background health probes
//! - [`ResultAggregator`]: dedup, ranking and paging
//! - [`SearchOrchestrator`]: deadline-bounded fan-out

pub mod circuit_breaker;
pub mod health_monitor;
pub mod metrics;
pub mod provider_registry;
pub mod result_aggregator;
pub mod search_orchestrator;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState, Permit,
};
pub use health_monitor::{HealthMonitor, HealthMonitorConfig};
pub use metrics::{MetricsCollector, MetricsConfig};
pub use provider_registry::{
    Deactivation, ProviderHandle, ProviderHealthReport, ProviderRegistry, Selection, SkipReason,
    SyncReport,
};
pub use result_aggregator::{AggregatedOffers, ProviderStats, ResultAggregator, SearchOptions};
pub use search_orchestrator::{
    AirportSearchResponse, OrchestratorConfig, ProviderStatus, SearchOrchestrator, SearchResponse,
};
