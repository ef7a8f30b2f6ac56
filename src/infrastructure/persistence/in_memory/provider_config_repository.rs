//! # In-Memory Provider Config Repository
//!
//! In-memory implementation of [`ProviderConfigRepository`], standing in for
//! the admin configuration store in tests, the CLI and embedded setups.

use crate::domain::entities::ProviderConfig;
use crate::domain::value_objects::ProviderId;
use crate::infrastructure::persistence::traits::{ProviderConfigRepository, RepositoryResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of [`ProviderConfigRepository`].
#[derive(Debug, Clone)]
pub struct InMemoryProviderConfigRepository {
    storage: Arc<RwLock<BTreeMap<ProviderId, ProviderConfig>>>,
}

impl InMemoryProviderConfigRepository {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Creates a repository seeded with `configs`.
    #[must_use]
    pub fn with_configs(configs: impl IntoIterator<Item = ProviderConfig>) -> Self {
        let storage = configs
            .into_iter()
            .map(|c| (c.id().clone(), c))
            .collect();
        Self {
            storage: Arc::new(RwLock::new(storage)),
        }
    }

    /// Returns the number of configurations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage
            .try_read()
            .map(|guard| guard.len())
            .unwrap_or(0)
    }

    /// Returns true if the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryProviderConfigRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderConfigRepository for InMemoryProviderConfigRepository {
    async fn save(&self, config: &ProviderConfig) -> RepositoryResult<()> {
        let mut storage = self.storage.write().await;
        storage.insert(config.id().clone(), config.clone());
        Ok(())
    }

    async fn get(&self, id: &ProviderId) -> RepositoryResult<Option<ProviderConfig>> {
        let storage = self.storage.read().await;
        Ok(storage.get(id).cloned())
    }

    async fn get_all(&self) -> RepositoryResult<Vec<ProviderConfig>> {
        let storage = self.storage.read().await;
        Ok(storage.values().cloned().collect())
    }

    async fn find_active(&self) -> RepositoryResult<Vec<ProviderConfig>> {
        let storage = self.storage.read().await;
        Ok(storage.values().filter(|c| c.is_active()).cloned().collect())
    }

    async fn delete(&self, id: &ProviderId) -> RepositoryResult<bool> {
        let mut storage = self.storage.write().await;
        Ok(storage.remove(id).is_some())
    }

    async fn count(&self) -> RepositoryResult<u64> {
        let storage = self.storage.read().await;
        Ok(storage.len() as u64)
    }
}
