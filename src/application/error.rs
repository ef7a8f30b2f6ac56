//! # Application Errors
//!
//! Errors surfaced to callers of the search orchestrator.
//!
//! Individual provider failures never appear here on their own; they are
//! reported in the per-provider status of a (possibly degraded) response.
//! Only a search in which no provider succeeded fails, with an
//! [`AggregateSearchError`] listing every provider's failure.
//!
//! ```text
//! SearchError
//! ├── InvalidParams(DomainError)
//! ├── AllProvidersFailed(AggregateSearchError)
//! └── Cancelled
//! ```

use crate::domain::errors::DomainError;
use crate::domain::value_objects::ProviderId;
use crate::infrastructure::providers::error::{ProviderError, ProviderErrorKind};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One provider's contribution to a failed search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFailure {
    /// Provider that failed or was skipped.
    pub provider: ProviderId,
    /// Failure category.
    pub kind: ProviderErrorKind,
    /// Sanitized message.
    pub error: String,
}

impl ProviderFailure {
    /// Builds a failure entry from a provider error.
    #[must_use]
    pub fn new(provider: ProviderId, error: &ProviderError) -> Self {
        Self {
            provider,
            kind: error.kind(),
            error: error.public_message(),
        }
    }
}

/// Every provider failed or was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSearchError {
    /// One entry per provider, ordered by id.
    pub provider_errors: Vec<ProviderFailure>,
}

impl AggregateSearchError {
    /// Creates the error, ordering entries by provider id.
    #[must_use]
    pub fn new(mut provider_errors: Vec<ProviderFailure>) -> Self {
        provider_errors.sort_by(|a, b| a.provider.cmp(&b.provider));
        Self { provider_errors }
    }

    /// True if no provider was available at all.
    #[must_use]
    pub fn no_providers(&self) -> bool {
        self.provider_errors.is_empty()
    }
}

impl fmt::Display for AggregateSearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.provider_errors.is_empty() {
            return write!(f, "no provider available");
        }
        write!(f, "all {} providers failed", self.provider_errors.len())?;
        for failure in &self.provider_errors {
            write!(f, "; {}: {}", failure.provider, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateSearchError {}

/// Failure of a whole search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The search parameters are invalid.
    #[error("invalid search parameters: {0}")]
    InvalidParams(#[from] DomainError),

    /// No provider returned results.
    #[error(transparent)]
    AllProvidersFailed(#[from] AggregateSearchError),

    /// The caller cancelled the search.
    #[error("search cancelled")]
    Cancelled,
}

impl SearchError {
    /// The aggregate error, if every provider failed.
    #[must_use]
    pub fn provider_errors(&self) -> Option<&AggregateSearchError> {
        match self {
            Self::AllProvidersFailed(aggregate) => Some(aggregate),
            _ => None,
        }
    }

    /// True for caller-side problems (bad input).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidParams(_))
    }
}

/// Result alias for search operations.
pub type SearchResult<T> = Result<T, SearchError>;
