//! # In-Memory Repositories

pub mod provider_config_repository;

pub use provider_config_repository::InMemoryProviderConfigRepository;
