//! # Adapter Base
//!
//! State shared by every concrete adapter through composition: identity,
//! connection state set by `initialize`, call bounding and local counters.

use crate::domain::entities::{ProviderCredentials, ProviderMetrics};
use crate::domain::value_objects::ProviderId;
use crate::domain::value_objects::timestamp::Timestamp;
use crate::infrastructure::providers::error::{AdapterResult, ProviderError};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Connection state of an adapter.
#[derive(Debug, Clone, Default)]
pub enum ConnectionState {
    /// `initialize` has not run.
    #[default]
    Uninitialized,
    /// Credentials accepted.
    Ready(ProviderCredentials),
    /// Credentials rejected.
    Failed(String),
}

#[derive(Debug, Default)]
struct LocalCounters {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    latency_sum_ms: AtomicU64,
    last_used_ms: AtomicI64,
}

/// Identity, connection state and counters embedded in each adapter.
#[derive(Debug)]
pub struct AdapterBase {
    provider_id: ProviderId,
    timeout_ms: u64,
    state: RwLock<ConnectionState>,
    counters: LocalCounters,
}

impl AdapterBase {
    /// Creates an uninitialized base.
    #[must_use]
    pub fn new(provider_id: ProviderId, timeout_ms: u64) -> Self {
        Self {
            provider_id,
            timeout_ms,
            state: RwLock::new(ConnectionState::Uninitialized),
            counters: LocalCounters::default(),
        }
    }

    /// Provider id.
    #[inline]
    #[must_use]
    pub fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    /// Per-call timeout.
    #[inline]
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Stores accepted credentials.
    pub fn mark_ready(&self, credentials: ProviderCredentials) {
        *self.state.write() = ConnectionState::Ready(credentials);
    }

    /// Records a rejected `initialize` and returns the matching error.
    pub fn mark_failed(&self, message: impl Into<String>) -> ProviderError {
        let message = message.into();
        *self.state.write() = ConnectionState::Failed(message.clone());
        ProviderError::configuration(message)
    }

    /// Snapshot of the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.read().clone()
    }

    /// True once credentials were accepted.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), ConnectionState::Ready(_))
    }

    /// Accepted credentials.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if `initialize` has not
    /// succeeded.
    pub fn credentials(&self) -> AdapterResult<ProviderCredentials> {
        match &*self.state.read() {
            ConnectionState::Ready(credentials) => Ok(credentials.clone()),
            ConnectionState::Uninitialized => Err(ProviderError::configuration(format!(
                "provider {} not initialized",
                self.provider_id
            ))),
            ConnectionState::Failed(reason) => Err(ProviderError::configuration(reason.clone())),
        }
    }

    /// Runs `call` bounded by the per-call timeout and `cancel`, recording
    /// the outcome in the local counters. Cancelled calls are not counted.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Timeout` after `timeout_ms`,
    /// `ProviderError::Cancelled` when `cancel` fires, or the call's own error.
    pub async fn bounded<T, F>(&self, cancel: &CancellationToken, call: F) -> AdapterResult<T>
    where
        F: Future<Output = AdapterResult<T>> + Send,
    {
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            outcome = tokio::time::timeout(Duration::from_millis(self.timeout_ms), call) => {
                outcome.unwrap_or_else(|_| {
                    Err(ProviderError::timeout_with_duration(
                        format!("{} did not answer in time", self.provider_id),
                        self.timeout_ms,
                    ))
                })
            }
        };
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.record(result.is_ok(), elapsed);
        result
    }

    fn record(&self, success: bool, latency_ms: u64) {
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.counters
            .latency_sum_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        self.counters
            .last_used_ms
            .store(Timestamp::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Lifetime counters for calls made through [`bounded`](Self::bounded).
    #[must_use]
    pub fn metrics(&self) -> ProviderMetrics {
        let total = self.counters.total.load(Ordering::Relaxed);
        let succeeded = self.counters.succeeded.load(Ordering::Relaxed);
        let failed = self.counters.failed.load(Ordering::Relaxed);
        let latency_sum = self.counters.latency_sum_ms.load(Ordering::Relaxed);
        let last_used = self.counters.last_used_ms.load(Ordering::Relaxed);
        let (average_latency_ms, success_rate) = if total == 0 {
            (0.0, 0.0)
        } else {
            (latency_sum as f64 / total as f64, succeeded as f64 / total as f64)
        };
        ProviderMetrics {
            total_requests: total,
            successful_requests: succeeded,
            failed_requests: failed,
            average_latency_ms,
            success_rate,
            last_used: (last_used > 0).then(|| Timestamp::from_millis(last_used)).flatten(),
        }
    }
}
