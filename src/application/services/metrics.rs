//! # Metrics Collector
//!
//! Per-provider request counters with a sliding window for success rate
//! and latency.
//!
//! Lifetime totals (`total_requests`, `successful_requests`,
//! `failed_requests`) never reset; `success_rate` and
//! `average_latency_ms` are computed over the last `window_size`
//! outcomes so an old outage stops weighing on tie-breaks once the
//! provider has recovered.
//!
//! Every provider has its own lock. Recording for one provider never
//! waits on another.

use crate::domain::entities::ProviderMetrics;
use crate::domain::value_objects::ProviderId;
use crate::domain::value_objects::timestamp::Timestamp;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Sliding window settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Outcomes kept per provider.
    pub window_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { window_size: 100 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    duration_ms: u64,
    success: bool,
}

#[derive(Debug, Default)]
struct ProviderWindow {
    total: u64,
    successes: u64,
    failures: u64,
    samples: VecDeque<Sample>,
    last_used: Option<Timestamp>,
}

impl ProviderWindow {
    fn record(&mut self, sample: Sample, window_size: usize) {
        self.total += 1;
        if sample.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.samples.push_back(sample);
        while self.samples.len() > window_size {
            self.samples.pop_front();
        }
        self.last_used = Some(Timestamp::now());
    }

    fn success_rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 1.0;
        }
        let ok = self.samples.iter().filter(|s| s.success).count();
        ok as f64 / self.samples.len() as f64
    }

    fn average_latency_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.samples.iter().map(|s| s.duration_ms).sum();
        sum as f64 / self.samples.len() as f64
    }

    fn snapshot(&self) -> ProviderMetrics {
        ProviderMetrics {
            total_requests: self.total,
            successful_requests: self.successes,
            failed_requests: self.failures,
            average_latency_ms: self.average_latency_ms(),
            success_rate: self.success_rate(),
            last_used: self.last_used,
        }
    }
}

/// Live request metrics for all providers.
#[derive(Debug)]
pub struct MetricsCollector {
    config: MetricsConfig,
    providers: DashMap<ProviderId, Arc<Mutex<ProviderWindow>>>,
}

impl MetricsCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            providers: DashMap::new(),
        }
    }

    /// Records one completed or timed-out provider call.
    pub fn record_request(&self, provider: &ProviderId, duration_ms: u64, success: bool) {
        // Clone the Arc out so the map shard is released before locking.
        let window = self
            .providers
            .entry(provider.clone())
            .or_default()
            .value()
            .clone();
        window.lock().record(
            Sample {
                duration_ms,
                success,
            },
            self.config.window_size.max(1),
        );
        trace!(provider = %provider, duration_ms, success, "request recorded");
    }

    /// Metrics for `provider`; empty if nothing was recorded yet.
    #[must_use]
    pub fn snapshot(&self, provider: &ProviderId) -> ProviderMetrics {
        self.window(provider)
            .map(|w| w.lock().snapshot())
            .unwrap_or_default()
    }

    /// Windowed success rate, `1.0` for a provider with no history.
    #[must_use]
    pub fn success_rate(&self, provider: &ProviderId) -> f64 {
        self.window(provider)
            .map_or(1.0, |w| w.lock().success_rate())
    }

    /// Windowed mean latency, `0.0` for a provider with no history.
    #[must_use]
    pub fn average_latency_ms(&self, provider: &ProviderId) -> f64 {
        self.window(provider)
            .map_or(0.0, |w| w.lock().average_latency_ms())
    }

    /// Snapshots of every provider seen so far, ordered by id.
    #[must_use]
    pub fn all(&self) -> Vec<(ProviderId, ProviderMetrics)> {
        let windows: Vec<_> = self
            .providers
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let mut all: Vec<_> = windows
            .into_iter()
            .map(|(id, w)| {
                let snap = w.lock().snapshot();
                (id, snap)
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Drops the history of `provider`.
    pub fn remove(&self, provider: &ProviderId) {
        self.providers.remove(provider);
    }

    fn window(&self, provider: &ProviderId) -> Option<Arc<Mutex<ProviderWindow>>> {
        self.providers.get(provider).map(|e| e.value().clone())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}
