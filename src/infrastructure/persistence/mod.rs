//! # Persistence Layer
//!
//! ## Repository Traits (Ports)
//!
//! - [`ProviderConfigRepository`]: Administrative provider configuration
//!
//! ## Implementations
//!
//! - `in_memory`: In-memory implementation

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemoryProviderConfigRepository;
pub use traits::{ProviderConfigRepository, RepositoryError, RepositoryResult};
