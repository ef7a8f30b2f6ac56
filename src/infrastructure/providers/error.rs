//! # Provider Errors
//!
//! Error types for provider adapter calls.
//!
//! Every failure a provider call can end in is a [`ProviderError`]. The
//! coarse [`ProviderErrorKind`] is what response metadata and the aggregate
//! error expose; [`ProviderError::public_message`] is the only text that
//! leaves the process.
//!
//! # Examples
//!
//! ```
//! use flight_aggregator::infrastructure::providers::error::{ProviderError, ProviderErrorKind};
//!
//! let error = ProviderError::timeout_with_duration("search timed out", 5000);
//! assert!(error.is_retryable());
//! assert!(error.counts_as_failure());
//! assert_eq!(error.kind(), ProviderErrorKind::Timeout);
//!
//! let error = ProviderError::upstream("502 from https://gds.example/search?apikey=abc", Some(502));
//! assert!(!error.public_message().contains("abc"));
//! ```

use crate::domain::value_objects::ProviderId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Longest message exposed in response metadata.
pub const MAX_PUBLIC_MESSAGE_LEN: usize = 200;

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_KEY_SUFFIXES: [&str; 4] = ["key", "token", "secret", "password"];

/// Coarse classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderErrorKind {
    /// Missing or malformed credentials.
    Configuration,
    /// Per-call timeout or overall deadline exceeded.
    Timeout,
    /// Application-level failure reported by the provider.
    Provider,
    /// Skipped because the circuit is open.
    CircuitOpen,
    /// The caller abandoned the search.
    Cancelled,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Provider => write!(f, "PROVIDER"),
            Self::CircuitOpen => write!(f, "CIRCUIT_OPEN"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Error type for provider adapter operations.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Credentials missing or malformed.
    #[error("provider configuration error: {message}")]
    Configuration {
        /// Error message.
        message: String,
    },

    /// Request timed out.
    #[error("provider timeout: {message}")]
    Timeout {
        /// Error message.
        message: String,
        /// Timeout duration in milliseconds.
        timeout_ms: Option<u64>,
    },

    /// Network or connection error.
    #[error("provider connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Credentials rejected by the provider.
    #[error("provider authentication error: {message}")]
    Authentication {
        /// Error message.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("provider rate limit exceeded: {message}")]
    RateLimited {
        /// Error message.
        message: String,
        /// Retry after duration in milliseconds.
        retry_after_ms: Option<u64>,
    },

    /// The provider rejected the request parameters.
    #[error("provider invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },

    /// The provider failed server-side.
    #[error("provider upstream error: {message}")]
    Upstream {
        /// Error message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// Response could not be understood.
    #[error("provider protocol error: {message}")]
    Protocol {
        /// Error message.
        message: String,
    },

    /// Call skipped because the circuit is open.
    #[error("circuit open for provider {provider}")]
    CircuitOpen {
        /// The skipped provider.
        provider: ProviderId,
    },

    /// Call abandoned because the search was cancelled.
    #[error("provider call cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
            timeout_ms: None,
        }
    }

    /// Creates a timeout error with duration.
    #[must_use]
    pub fn timeout_with_duration(message: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            message: message.into(),
            timeout_ms: Some(timeout_ms),
        }
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a rate limited error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Creates a rate limited error with retry duration.
    #[must_use]
    pub fn rate_limited_with_retry(message: impl Into<String>, retry_after_ms: u64) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after_ms: Some(retry_after_ms),
        }
    }

    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an upstream (server-side) error.
    #[must_use]
    pub fn upstream(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Upstream {
            message: message.into(),
            status,
        }
    }

    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a circuit-open skip marker.
    #[must_use]
    pub fn circuit_open(provider: ProviderId) -> Self {
        Self::CircuitOpen { provider }
    }

    /// Coarse classification.
    #[must_use]
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Configuration { .. } => ProviderErrorKind::Configuration,
            Self::Timeout { .. } => ProviderErrorKind::Timeout,
            Self::CircuitOpen { .. } => ProviderErrorKind::CircuitOpen,
            Self::Cancelled => ProviderErrorKind::Cancelled,
            Self::Connection { .. }
            | Self::Authentication { .. }
            | Self::RateLimited { .. }
            | Self::InvalidRequest { .. }
            | Self::Upstream { .. }
            | Self::Protocol { .. } => ProviderErrorKind::Provider,
        }
    }

    /// Returns true if this error is transient and may succeed on a later
    /// search.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connection { .. } | Self::RateLimited { .. } => true,
            Self::Upstream { status, .. } => status.is_none_or(|s| s >= 500),
            _ => false,
        }
    }

    /// Returns true if the outcome should be recorded against the
    /// provider's circuit breaker and metrics.
    ///
    /// Skips and cancellations are avoidances, not observed failures.
    #[must_use]
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, Self::CircuitOpen { .. } | Self::Cancelled)
    }

    /// Returns the retry delay in milliseconds, if applicable.
    #[must_use]
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }

    /// Message safe to include in response metadata.
    #[must_use]
    pub fn public_message(&self) -> String {
        sanitize_message(&self.to_string())
    }
}

/// Result type for provider operations.
pub type AdapterResult<T> = Result<T, ProviderError>;

/// Strips credentials and noise from a provider-supplied message.
///
/// Bearer/basic tokens and `*key=`, `*token=`, `*secret=`, `*password=`
/// values are replaced, URL query strings are dropped, whitespace is
/// collapsed and the result is capped at [`MAX_PUBLIC_MESSAGE_LEN`] chars.
#[must_use]
pub fn sanitize_message(raw: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut redact_next = false;
    for word in raw.split_whitespace() {
        if redact_next {
            words.push(REDACTED.to_string());
            redact_next = false;
            continue;
        }
        if word.eq_ignore_ascii_case("bearer") || word.eq_ignore_ascii_case("basic") {
            redact_next = true;
            words.push(word.to_string());
            continue;
        }
        words.push(sanitize_word(word));
    }
    truncate(words.join(" "))
}

fn sanitize_word(word: &str) -> String {
    let word = if word.contains("://") {
        word.split_once('?').map_or(word, |(head, _)| head)
    } else {
        word
    };
    word.split('&').map(redact_pair).collect::<Vec<_>>().join("&")
}

fn redact_pair(part: &str) -> String {
    match part.split_once('=') {
        Some((key, _)) if is_sensitive_key(key) => format!("{key}={REDACTED}"),
        _ => part.to_string(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key
        .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_ascii_lowercase();
    SENSITIVE_KEY_SUFFIXES.iter().any(|s| key.ends_with(s))
}

fn truncate(message: String) -> String {
    if message.chars().count() <= MAX_PUBLIC_MESSAGE_LEN {
        return message;
    }
    let mut cut: String = message.chars().take(MAX_PUBLIC_MESSAGE_LEN - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    mod classification {
        use super::*;

        #[test]
        fn timeout_is_retryable_failure() {
            let error = ProviderError::timeout("test");
            assert!(error.is_retryable());
            assert!(error.counts_as_failure());
            assert_eq!(error.kind(), ProviderErrorKind::Timeout);
        }

        #[test]
        fn rate_limited_carries_retry_hint() {
            let error = ProviderError::rate_limited_with_retry("slow down", 1000);
            assert!(error.is_retryable());
            assert_eq!(error.retry_after_ms(), Some(1000));
            assert_eq!(error.kind(), ProviderErrorKind::Provider);
        }

        #[test]
        fn client_side_upstream_is_not_retryable() {
            assert!(!ProviderError::upstream("gone", Some(410)).is_retryable());
            assert!(ProviderError::upstream("bad gateway", Some(502)).is_retryable());
        }

        #[test]
        fn configuration_is_not_retryable() {
            let error = ProviderError::configuration("missing api key");
            assert!(!error.is_retryable());
            assert_eq!(error.kind(), ProviderErrorKind::Configuration);
        }

        #[test]
        fn skips_do_not_count_as_failures() {
            assert!(!ProviderError::circuit_open(ProviderId::new("p")).counts_as_failure());
            assert!(!ProviderError::Cancelled.counts_as_failure());
            assert!(ProviderError::protocol("bad json").counts_as_failure());
        }
    }

    mod sanitize {
        use super::*;

        #[test]
        fn redacts_bearer_token() {
            let msg = sanitize_message("401 with Authorization: Bearer abc.def.ghi rejected");
            assert!(!msg.contains("abc.def.ghi"));
            assert!(msg.contains("Bearer [REDACTED]"));
        }

        #[test]
        fn strips_url_query() {
            let msg = sanitize_message("GET https://gds.example/v1/search?origin=JFK&apikey=xyz failed");
            assert_eq!(msg, "GET https://gds.example/v1/search failed");
        }

        #[test]
        fn redacts_key_value_pairs() {
            let msg = sanitize_message("rejected api_key=abc123&user=bob access_token=t0k");
            assert_eq!(msg, "rejected api_key=[REDACTED]&user=bob access_token=[REDACTED]");
        }

        #[test]
        fn collapses_whitespace() {
            assert_eq!(sanitize_message("  upstream \n\t failed  "), "upstream failed");
        }

        #[test]
        fn truncates_long_messages() {
            let msg = sanitize_message(&"x".repeat(500));
            assert_eq!(msg.chars().count(), MAX_PUBLIC_MESSAGE_LEN);
            assert!(msg.ends_with("..."));
        }

        #[test]
        fn public_message_uses_display() {
            let error = ProviderError::upstream("500 token=secretvalue", Some(500));
            let msg = error.public_message();
            assert!(msg.starts_with("provider upstream error"));
            assert!(!msg.contains("secretvalue"));
        }
    }
}
