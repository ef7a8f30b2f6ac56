//! # REST Flight Provider
//!
//! Adapter for JSON aggregator/GDS gateways exposing:
//!
//! - `POST /flights/search` with the search parameters as body
//! - `GET /airports?q=&limit=`
//! - `GET /health`
//!
//! Requests are authenticated with `Authorization: Bearer <api_key>`.
//! Wire records are mapped into domain offers and filtered against the
//! search constraints before they leave the adapter.

use crate::domain::entities::{
    Airport, FlightOffer, Itinerary, PriceBreakdown, ProviderConfig, ProviderCredentials,
    ProviderHealth, ProviderMetrics, Segment,
};
use crate::domain::errors::DomainResult;
use crate::domain::value_objects::{
    AirportSearchParams, CabinClass, CurrencyCode, FlightSearchParams, OfferId, ProviderId,
};
use crate::infrastructure::providers::base::AdapterBase;
use crate::infrastructure::providers::error::{AdapterResult, ProviderError};
use crate::infrastructure::providers::http_client::HttpClient;
use crate::infrastructure::providers::traits::ProviderAdapter;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    offers: Vec<WireOffer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOffer {
    id: String,
    price: WirePrice,
    itineraries: Vec<WireItinerary>,
    #[serde(default)]
    available_seats: Option<u16>,
    #[serde(default)]
    validating_airline: Option<String>,
    #[serde(default)]
    cabin: Option<CabinClass>,
    #[serde(default)]
    fare_class: Option<String>,
    #[serde(default)]
    booking_class: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePrice {
    #[serde(default)]
    base: Decimal,
    #[serde(default)]
    taxes: Decimal,
    #[serde(default)]
    fees: Decimal,
    total: Decimal,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct WireItinerary {
    segments: Vec<WireSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSegment {
    carrier: String,
    flight_number: String,
    from: String,
    to: String,
    departure: NaiveDateTime,
    arrival: NaiveDateTime,
    #[serde(default)]
    duration_minutes: Option<u32>,
    #[serde(default)]
    stops: u8,
}

impl WireOffer {
    fn into_offer(self, provider: &ProviderId, requested_cabin: CabinClass) -> DomainResult<FlightOffer> {
        let itineraries = self
            .itineraries
            .into_iter()
            .map(|it| {
                let segments = it
                    .segments
                    .into_iter()
                    .map(|s| {
                        let segment =
                            Segment::new(s.carrier, s.flight_number, s.from, s.to, s.departure, s.arrival)
                                .with_stops(s.stops);
                        match s.duration_minutes {
                            Some(minutes) => segment.with_duration(minutes),
                            None => segment,
                        }
                    })
                    .collect();
                Itinerary::new(segments)
            })
            .collect::<DomainResult<Vec<_>>>()?;
        let price = PriceBreakdown::with_total(
            self.price.base,
            self.price.taxes,
            self.price.fees,
            self.price.total,
            CurrencyCode::new(&self.price.currency)?,
        );
        let mut offer = FlightOffer::new(OfferId::new(self.id), provider.clone(), price, itineraries)?
            .with_cabin_class(self.cabin.unwrap_or(requested_cabin));
        if let Some(seats) = self.available_seats {
            offer = offer.with_available_seats(seats);
        }
        if let Some(airline) = self.validating_airline {
            offer = offer.with_validating_airline(airline);
        }
        if let (Some(fare), Some(booking)) = (self.fare_class, self.booking_class) {
            offer = offer.with_fare_class(fare, booking);
        }
        Ok(offer)
    }
}

#[derive(Debug, Deserialize)]
struct AirportsResponse {
    #[serde(default)]
    airports: Vec<WireAirport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAirport {
    iata_code: String,
    name: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
}

/// Adapter for a JSON aggregator API.
#[derive(Debug)]
pub struct RestFlightProvider {
    base: AdapterBase,
    client: RwLock<Option<HttpClient>>,
}

impl RestFlightProvider {
    /// Creates an uninitialized adapter from its configuration.
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base: AdapterBase::new(config.id().clone(), config.timeout_ms()),
            client: RwLock::new(None),
        }
    }

    fn client(&self) -> AdapterResult<HttpClient> {
        self.base.credentials()?;
        self.client
            .read()
            .clone()
            .ok_or_else(|| ProviderError::configuration("HTTP client not initialized"))
    }
}

#[async_trait]
impl ProviderAdapter for RestFlightProvider {
    fn provider_id(&self) -> &ProviderId {
        self.base.provider_id()
    }

    fn timeout_ms(&self) -> u64 {
        self.base.timeout_ms()
    }

    async fn initialize(&self, credentials: &ProviderCredentials) -> AdapterResult<()> {
        let Some(base_url) = credentials.base_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Err(self.base.mark_failed("missing base_url"));
        };
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(self.base.mark_failed("base_url must be an http(s) URL"));
        }
        let Some(api_key) = credentials.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Err(self.base.mark_failed("missing api_key"));
        };

        let client = match HttpClient::new(base_url, self.base.timeout_ms()) {
            Ok(client) => client.with_bearer(api_key.trim()),
            Err(e) => return Err(self.base.mark_failed(e.to_string())),
        };
        *self.client.write() = Some(client);
        self.base.mark_ready(credentials.clone());
        debug!(provider = %self.base.provider_id(), "REST provider initialized");
        Ok(())
    }

    async fn search_flights(
        &self,
        params: &FlightSearchParams,
        cancel: &CancellationToken,
    ) -> AdapterResult<Vec<FlightOffer>> {
        let client = self.client()?;
        let provider = self.base.provider_id().clone();
        self.base
            .bounded(cancel, async {
                let response: SearchResponse = client.post_json("/flights/search", params).await?;
                let mut offers = Vec::with_capacity(response.offers.len());
                for wire in response.offers {
                    match wire.into_offer(&provider, params.cabin_class()) {
                        Ok(offer) if offer.satisfies(params) => offers.push(offer),
                        Ok(_) => {}
                        Err(e) => {
                            warn!(provider = %provider, error = %e, "dropping malformed offer");
                        }
                    }
                }
                Ok(offers)
            })
            .await
    }

    async fn search_airports(
        &self,
        params: &AirportSearchParams,
        cancel: &CancellationToken,
    ) -> AdapterResult<Vec<Airport>> {
        let client = self.client()?;
        let limit = params.limit().to_string();
        let query = [("q", params.query()), ("limit", limit.as_str())];
        self.base
            .bounded(cancel, async {
                let response: AirportsResponse = client.get_json("/airports", &query).await?;
                Ok(response
                    .airports
                    .into_iter()
                    .filter_map(|a| {
                        let airport = Airport::new(&a.iata_code, a.name).ok()?;
                        Some(match (a.city, a.country_code) {
                            (Some(city), Some(country)) => airport.with_location(city, country),
                            _ => airport,
                        })
                    })
                    .take(params.limit())
                    .collect())
            })
            .await
    }

    async fn check_health(&self) -> AdapterResult<ProviderHealth> {
        let client = self.client()?;
        let started = Instant::now();
        client.probe("/health").await?;
        let latency = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(ProviderHealth::healthy(self.base.provider_id().clone(), latency))
    }

    fn get_metrics(&self) -> ProviderMetrics {
        self.base.metrics()
    }
}
