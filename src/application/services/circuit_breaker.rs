//! # Circuit Breaker
//!
//! Per-provider failure isolation.
//!
//! ```text
//! Closed --[consecutive failures or window failure rate]--> Open
//! Open --[cooldown elapsed, checked in allow_request]--> HalfOpen
//! HalfOpen --[trial success]--> Closed
//! HalfOpen --[trial failure]--> Open (cooldown restarts)
//! ```
//!
//! Each breaker owns its state behind its own mutex; no lock is shared
//! between providers.
//!
//! # Examples
//!
//! ```
//! use flight_aggregator::application::services::circuit_breaker::{
//!     CircuitBreaker, CircuitBreakerConfig, CircuitState,
//! };
//! use flight_aggregator::domain::value_objects::ProviderId;
//! use flight_aggregator::infrastructure::providers::ProviderError;
//!
//! let breaker = CircuitBreaker::new(ProviderId::new("gds"), CircuitBreakerConfig::default());
//! for _ in 0..5 {
//!     assert!(breaker.allow_request());
//!     breaker.record_failure(&ProviderError::timeout("slow"));
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(!breaker.allow_request());
//! ```

use crate::domain::value_objects::ProviderId;
use crate::domain::value_objects::timestamp::Timestamp;
use crate::infrastructure::providers::error::ProviderError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Breaker thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Outcomes kept in the rolling window.
    pub window_size: usize,
    /// Outcomes required before the failure rate is considered.
    pub min_samples: usize,
    /// Window failure fraction above which the circuit opens.
    pub failure_rate_threshold: f64,
    /// Time spent open before a trial is allowed.
    pub cooldown_ms: u64,
    /// Trial successes needed in half-open to close.
    pub success_threshold: u32,
    /// Concurrent trials allowed in half-open.
    pub half_open_max_trials: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_size: 20,
            min_samples: 10,
            failure_rate_threshold: 0.5,
            cooldown_ms: 30_000,
            success_threshold: 1,
            half_open_max_trials: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Cooldown as a duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Sets the cooldown.
    #[must_use]
    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    /// Sets the consecutive-failure threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Checks the thresholds for consistency.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("circuit_breaker.failure_threshold must be at least 1".into());
        }
        if self.window_size == 0 {
            return Err("circuit_breaker.window_size must be at least 1".into());
        }
        if self.min_samples > self.window_size {
            return Err("circuit_breaker.min_samples cannot exceed window_size".into());
        }
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 1.0) {
            return Err("circuit_breaker.failure_rate_threshold must be in (0, 1]".into());
        }
        if self.success_threshold == 0 || self.half_open_max_trials == 0 {
            return Err("circuit_breaker half-open thresholds must be at least 1".into());
        }
        Ok(())
    }
}

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are short-circuited.
    Open,
    /// A limited number of trial requests are allowed.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// A request slot granted by [`CircuitBreaker::try_acquire`].
///
/// A trial permit occupies one of the half-open slots of the episode it
/// was granted in. Returning it through [`CircuitBreaker::release`] after
/// the breaker has moved on is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// Granted while closed; holds no slot.
    Normal,
    /// Granted while half-open.
    Trial {
        /// Half-open episode the slot belongs to.
        epoch: u64,
    },
}

impl Permit {
    /// True for a half-open trial permit.
    #[inline]
    #[must_use]
    pub fn is_trial(&self) -> bool {
        matches!(self, Self::Trial { .. })
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    /// Provider guarded by the breaker.
    pub provider: ProviderId,
    /// Current state.
    pub state: CircuitState,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Successful trials in the current half-open phase.
    pub trial_successes: u32,
    /// Failure fraction over the rolling window.
    pub window_failure_rate: f64,
    /// When the state last changed.
    pub last_transition: Timestamp,
    /// Times the circuit has opened.
    pub times_opened: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    last_transition: Timestamp,
    trials_in_flight: u32,
    trial_successes: u32,
    times_opened: u64,
    epoch: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            window: VecDeque::new(),
            opened_at: None,
            last_transition: Timestamp::now(),
            trials_in_flight: 0,
            trial_successes: 0,
            times_opened: 0,
            epoch: 0,
        }
    }

    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|ok| !**ok).count();
        failures as f64 / self.window.len() as f64
    }

    fn push_outcome(&mut self, success: bool, window_size: usize) {
        self.window.push_back(success);
        while self.window.len() > window_size {
            self.window.pop_front();
        }
    }

    fn transition(&mut self, to: CircuitState) {
        self.state = to;
        self.last_transition = Timestamp::now();
        self.trials_in_flight = 0;
        self.trial_successes = 0;
        self.epoch += 1;
        match to {
            CircuitState::Open => {
                self.opened_at = Some(Instant::now());
                self.times_opened += 1;
            }
            CircuitState::Closed => {
                self.opened_at = None;
                self.consecutive_failures = 0;
                self.window.clear();
            }
            CircuitState::HalfOpen => {}
        }
    }
}

/// Failure-isolation state machine for one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: ProviderId,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(provider: ProviderId, config: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            config,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    /// Guarded provider.
    #[inline]
    #[must_use]
    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// Thresholds in use.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns a permit if a request may be sent now.
    ///
    /// In `Open`, the first call after the cooldown moves the breaker to
    /// `HalfOpen` and takes a trial slot. In `HalfOpen`, slots are handed
    /// out up to `half_open_max_trials`. A trial permit must be settled
    /// with a recorded outcome or handed back through
    /// [`release`](Self::release).
    #[must_use]
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(Permit::Normal),
            CircuitState::Open => {
                let cooled = inner
                    .opened_at
                    .is_none_or(|at| at.elapsed() >= self.config.cooldown());
                if !cooled {
                    return None;
                }
                inner.transition(CircuitState::HalfOpen);
                inner.trials_in_flight = 1;
                info!(provider = %self.provider, state = %CircuitState::HalfOpen, "circuit cooldown elapsed, allowing trial");
                Some(Permit::Trial { epoch: inner.epoch })
            }
            CircuitState::HalfOpen => {
                if inner.trials_in_flight < self.config.half_open_max_trials {
                    inner.trials_in_flight += 1;
                    Some(Permit::Trial { epoch: inner.epoch })
                } else {
                    None
                }
            }
        }
    }

    /// Returns true if a request may be sent now. Same slot rules as
    /// [`try_acquire`](Self::try_acquire).
    #[must_use]
    pub fn allow_request(&self) -> bool {
        self.try_acquire().is_some()
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                inner.push_outcome(true, self.config.window_size);
            }
            CircuitState::HalfOpen => {
                inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
                inner.trial_successes += 1;
                if inner.trial_successes >= self.config.success_threshold {
                    inner.transition(CircuitState::Closed);
                    info!(provider = %self.provider, state = %CircuitState::Closed, "circuit closed after successful trial");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed call. Skips and cancellations are ignored.
    pub fn record_failure(&self, error: &ProviderError) {
        if !error.counts_as_failure() {
            return;
        }
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                inner.push_outcome(false, self.config.window_size);
                let by_count = inner.consecutive_failures >= self.config.failure_threshold;
                let by_rate = inner.window.len() >= self.config.min_samples
                    && inner.failure_rate() > self.config.failure_rate_threshold;
                if by_count || by_rate {
                    let failures = inner.consecutive_failures;
                    let rate = inner.failure_rate();
                    inner.transition(CircuitState::Open);
                    warn!(
                        provider = %self.provider,
                        state = %CircuitState::Open,
                        consecutive_failures = failures,
                        failure_rate = rate,
                        error = %error,
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.transition(CircuitState::Open);
                warn!(provider = %self.provider, state = %CircuitState::Open, error = %error, "trial failed, circuit reopened");
            }
            CircuitState::Open => {}
        }
    }

    /// Hands back a permit whose outcome was never observed, e.g. when
    /// the search that took it was cancelled or dropped.
    pub fn release(&self, permit: Permit) {
        let Permit::Trial { epoch } = permit else {
            return;
        };
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.epoch == epoch {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }

    /// Current state without taking a permit.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Full view of the breaker without taking a permit.
    #[must_use]
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            provider: self.provider.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            trial_successes: inner.trial_successes,
            window_failure_rate: inner.failure_rate(),
            last_transition: inner.last_transition,
            times_opened: inner.times_opened,
        }
    }
}
