//! # Aggregator Runtime
//!
//! Builds the registry, orchestrator and health monitor from
//! [`AppSettings`], registers the configured providers and owns the
//! background probe loop until [`shutdown`](AggregatorRuntime::shutdown).
//!
//! Nothing here is global: every runtime has its own registry, so tests
//! can run isolated instances side by side.
//!
//! # Examples
//!
//! ```no_run
//! use flight_aggregator::application::AggregatorRuntime;
//! use flight_aggregator::infrastructure::config::AppSettings;
//! use flight_aggregator::infrastructure::providers::AdapterFactory;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = AppSettings::load(None)?;
//! let runtime = AggregatorRuntime::from_settings(&settings, AdapterFactory::default()).await?;
//! // ... serve searches through runtime.orchestrator()
//! runtime.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::application::error::SearchResult;
use crate::application::services::health_monitor::HealthMonitor;
use crate::application::services::metrics::MetricsCollector;
use crate::application::services::provider_registry::{
    ProviderHealthReport, ProviderRegistry, SyncReport,
};
use crate::application::services::result_aggregator::SearchOptions;
use crate::application::services::search_orchestrator::{SearchOrchestrator, SearchResponse};
use crate::domain::value_objects::FlightSearchParams;
use crate::infrastructure::config::{AppSettings, SettingsResult};
use crate::infrastructure::persistence::traits::{ProviderConfigRepository, RepositoryResult};
use crate::infrastructure::providers::factory::AdapterFactory;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A running aggregation core.
#[derive(Debug)]
pub struct AggregatorRuntime {
    registry: Arc<ProviderRegistry>,
    orchestrator: Arc<SearchOrchestrator>,
    monitor: Arc<HealthMonitor>,
    factory: AdapterFactory,
    shutdown: CancellationToken,
    monitor_task: Option<JoinHandle<()>>,
}

impl AggregatorRuntime {
    /// Validates `settings`, registers every configured provider and starts
    /// the health monitor if enabled. Must be called within a Tokio runtime.
    ///
    /// Providers that fail to initialize are registered deactivated and
    /// logged; they do not prevent start-up.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` if the settings fail validation.
    pub async fn from_settings(settings: &AppSettings, factory: AdapterFactory) -> SettingsResult<Self> {
        settings.validate()?;

        let metrics = Arc::new(MetricsCollector::new(settings.metrics.clone()));
        let registry = Arc::new(ProviderRegistry::new(
            settings.circuit_breaker.clone(),
            metrics,
        ));
        for config in &settings.providers {
            let id = config.id().clone();
            if let Err(error) = registry.register(config.clone(), &factory).await {
                warn!(provider = %id, error = %error, "provider unavailable at start-up");
            }
        }

        let orchestrator = Arc::new(SearchOrchestrator::new(
            registry.clone(),
            settings.search.clone(),
        ));
        let monitor = Arc::new(HealthMonitor::new(registry.clone(), settings.health.clone()));
        let shutdown = CancellationToken::new();
        let monitor_task = settings
            .health
            .enabled
            .then(|| monitor.clone().spawn(shutdown.child_token()));

        info!(
            providers = registry.len(),
            deadline_ms = settings.search.deadline_ms,
            health_monitor = settings.health.enabled,
            "aggregator runtime started"
        );
        Ok(Self {
            registry,
            orchestrator,
            monitor,
            factory,
            shutdown,
            monitor_task,
        })
    }

    /// The provider registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The search orchestrator.
    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<SearchOrchestrator> {
        &self.orchestrator
    }

    /// The health monitor, for on-demand probe rounds.
    #[inline]
    #[must_use]
    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Runs one search with explicit options.
    ///
    /// # Errors
    ///
    /// See [`SearchOrchestrator::search_with_cancellation`].
    pub async fn search(
        &self,
        params: FlightSearchParams,
        options: SearchOptions,
    ) -> SearchResult<SearchResponse> {
        self.orchestrator
            .search_with_cancellation(params, options, &self.shutdown)
            .await
    }

    /// Per-provider availability for a system health endpoint.
    #[must_use]
    pub fn check_provider_health(&self) -> Vec<ProviderHealthReport> {
        self.registry.provider_health_report()
    }

    /// Applies the provider configurations stored in `repository`.
    ///
    /// # Errors
    ///
    /// Returns the repository error if configurations cannot be read.
    pub async fn sync_providers(
        &self,
        repository: &dyn ProviderConfigRepository,
    ) -> RepositoryResult<SyncReport> {
        self.registry.sync_from(repository, &self.factory).await
    }

    /// Stops the health monitor and cancels searches still running
    /// through [`search`](Self::search).
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.monitor_task.take()
            && let Err(error) = task.await
        {
            warn!(error = %error, "health monitor task ended abnormally");
        }
        info!("aggregator runtime stopped");
    }
}
