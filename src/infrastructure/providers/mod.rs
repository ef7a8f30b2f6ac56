//! # Provider Adapters
//!
//! Integrations with external flight-data providers.
//!
//! - [`ProviderAdapter`]: The uniform adapter contract
//! - [`ProviderResult`]: Per-call envelope collected by the orchestrator
//! - [`ProviderError`]: Failure taxonomy with sanitised public messages
//! - [`RestFlightProvider`], [`FixtureFlightProvider`]: Built-in adapters
//! - [`AdapterFactory`]: Adapter construction keyed by provider type

pub mod base;
pub mod error;
pub mod factory;
pub mod fixture;
pub mod http_client;
pub mod rest;
pub mod traits;

pub use base::{AdapterBase, ConnectionState};
pub use error::{AdapterResult, ProviderError, ProviderErrorKind, sanitize_message};
pub use factory::{AdapterBuilder, AdapterFactory};
pub use fixture::FixtureFlightProvider;
pub use http_client::HttpClient;
pub use rest::RestFlightProvider;
pub use traits::{ProviderAdapter, ProviderResult};
