//! # Domain Entities
//!
//! Entities representing the core concepts of flight aggregation.
//!
//! ## Offers
//!
//! - [`FlightOffer`]: A priced offer from one provider, with [`Itinerary`]
//!   and [`Segment`] detail and the [`DedupKey`] identifying the flight
//!
//! ## Providers
//!
//! - [`ProviderConfig`]: Administrative configuration
//! - [`ProviderHealth`], [`ProviderMetrics`]: Observed state
//!
//! ## Locations
//!
//! - [`Airport`]

pub mod airport;
pub mod flight_offer;
pub mod provider;

pub use airport::Airport;
pub use flight_offer::{AlternateProvider, DedupKey, FlightOffer, Itinerary, PriceBreakdown, Segment};
pub use provider::{
    DEFAULT_PROVIDER_TIMEOUT_MS, ProviderConfig, ProviderCredentials, ProviderHealth,
    ProviderMetrics,
};
