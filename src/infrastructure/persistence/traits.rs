//! # Repository Traits
//!
//! Port definitions for the administrative provider configuration store.
//!
//! The admin collaborator owns provider configuration; the core only reads
//! it through [`ProviderConfigRepository`] when the registry syncs.
//!
//! # Examples
//!
//! ```ignore
//! use flight_aggregator::infrastructure::persistence::traits::ProviderConfigRepository;
//!
//! async fn active_count(repo: &impl ProviderConfigRepository) -> usize {
//!     repo.find_active().await.map(|c| c.len()).unwrap_or(0)
//! }
//! ```

use crate::domain::entities::ProviderConfig;
use crate::domain::value_objects::ProviderId;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Error type for repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Entity not found.
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity.
        entity_type: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RepositoryError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Store of provider configurations.
#[async_trait]
pub trait ProviderConfigRepository: Send + Sync + fmt::Debug {
    /// Saves a configuration, replacing any with the same id.
    async fn save(&self, config: &ProviderConfig) -> RepositoryResult<()>;

    /// Gets a configuration by id.
    ///
    /// Returns `None` if the provider does not exist.
    async fn get(&self, id: &ProviderId) -> RepositoryResult<Option<ProviderConfig>>;

    /// Gets all configurations ordered by id.
    async fn get_all(&self) -> RepositoryResult<Vec<ProviderConfig>>;

    /// Finds configurations with `is_active` set.
    async fn find_active(&self) -> RepositoryResult<Vec<ProviderConfig>>;

    /// Deletes a configuration.
    ///
    /// Returns `true` if it existed.
    async fn delete(&self, id: &ProviderId) -> RepositoryResult<bool>;

    /// Counts stored configurations.
    async fn count(&self) -> RepositoryResult<u64>;
}
