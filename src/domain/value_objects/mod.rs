//! # Value Objects
//!
//! Immutable types with validation and domain semantics.
//!
//! ## Identity Types
//!
//! - [`ProviderId`], [`OfferId`]: String-based identifiers
//! - [`SearchId`]: UUID correlation id per search
//!
//! ## Money
//!
//! - [`CurrencyCode`]: validated ISO-4217 code
//!
//! ## Search Inputs
//!
//! - [`FlightSearchParams`], [`AirportSearchParams`], [`Pagination`]
//!
//! ## Domain Enums
//!
//! - `CabinClass`, `ProviderType`, `ProviderEnvironment`, `ProviderFeature`, `SortOption`

pub mod enums;
pub mod ids;
pub mod money;
pub mod search_params;
pub mod timestamp;

pub use enums::{
    CabinClass, ParseEnumError, ProviderEnvironment, ProviderFeature, ProviderType, SortOption,
};
pub use ids::{OfferId, ProviderId, SearchId};
pub use money::CurrencyCode;
pub use search_params::{AirportSearchParams, FlightSearchParams, Pagination};
pub use timestamp::Timestamp;
