//! # Health Monitor
//!
//! Background prober that calls `check_health` on every registered
//! provider at a fixed interval, independently of search traffic, and
//! stores the result in the [`ProviderRegistry`].
//!
//! The monitor never touches circuit breakers. Repeated probe failures
//! suspend a provider through the registry; the next good probe lifts the
//! suspension.

use crate::application::services::provider_registry::ProviderRegistry;
use crate::infrastructure::providers::error::ProviderError;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Probe schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthMonitorConfig {
    /// Whether the background loop runs at all.
    pub enabled: bool,
    /// Time between probe rounds.
    pub interval_ms: u64,
    /// Limit for a single `check_health` call.
    pub probe_timeout_ms: u64,
    /// Consecutive failed probes before suspension.
    pub suspension_threshold: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 60_000,
            probe_timeout_ms: 5_000,
            suspension_threshold: 3,
        }
    }
}

/// Periodic health prober.
#[derive(Debug)]
pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
    config: HealthMonitorConfig,
}

impl HealthMonitor {
    /// Creates a monitor over `registry`.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, config: HealthMonitorConfig) -> Self {
        Self { registry, config }
    }

    /// Schedule in use.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HealthMonitorConfig {
        &self.config
    }

    /// Probes every target once, concurrently, and stores the outcomes.
    ///
    /// Returns the number of providers probed.
    pub async fn probe_all(&self) -> usize {
        let targets = self.registry.health_targets();
        let timeout = Duration::from_millis(self.config.probe_timeout_ms);
        let probes = targets.into_iter().map(|(id, adapter)| async move {
            let outcome = match tokio::time::timeout(timeout, adapter.check_health()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::timeout_with_duration(
                    "health probe timed out",
                    self.config.probe_timeout_ms,
                )),
            };
            (id, outcome)
        });
        let outcomes = join_all(probes).await;
        let probed = outcomes.len();
        for (id, outcome) in outcomes {
            self.registry
                .apply_probe(&id, outcome, self.config.suspension_threshold);
        }
        debug!(providers = probed, "health probe round complete");
        probed
    }

    /// Runs probe rounds until `shutdown` is cancelled.
    ///
    /// The first round runs immediately.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(self.config.interval_ms.max(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = self.config.interval_ms, "health monitor started");
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            biased;
                            () = shutdown.cancelled() => break,
                            _ = self.probe_all() => {}
                        }
                    }
                }
            }
            info!("health monitor stopped");
        })
    }
}
