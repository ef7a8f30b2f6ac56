//! # Flight Offer Entity
//!
//! A priced, bookable combination of itineraries returned by one provider.
//!
//! Offers are immutable once built: merging duplicates produces a new
//! canonical offer via [`FlightOffer::with_alternates`] rather than editing
//! the original.
//!
//! # Examples
//!
//! ```
//! use flight_aggregator::domain::entities::flight_offer::{
//!     FlightOffer, Itinerary, PriceBreakdown, Segment,
//! };
//! use flight_aggregator::domain::value_objects::{CurrencyCode, OfferId, ProviderId};
//! use chrono::NaiveDate;
//! use rust_decimal::Decimal;
//!
//! let dep = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
//! let arr = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(13, 30, 0).unwrap();
//! let segment = Segment::new("AA", "123", "JFK", "LAX", dep, arr);
//! let offer = FlightOffer::new(
//!     OfferId::new("a-1"),
//!     ProviderId::new("provider-a"),
//!     PriceBreakdown::new(Decimal::new(170, 0), Decimal::new(30, 0), Decimal::ZERO, CurrencyCode::usd()),
//!     vec![Itinerary::new(vec![segment]).unwrap()],
//! )
//! .unwrap();
//!
//! assert_eq!(offer.dedup_key().as_str(), "JFK-LAX:AA123@2025-06-01T10:00");
//! assert_eq!(offer.total_price(), Decimal::new(200, 0));
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::enums::CabinClass;
use crate::domain::value_objects::money::CurrencyCode;
use crate::domain::value_objects::search_params::FlightSearchParams;
use crate::domain::value_objects::{OfferId, ProviderId};
use chrono::{NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One flown leg: a single flight number between two airports.
///
/// Times are local to the respective airports, as published by carriers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    carrier_code: String,
    flight_number: String,
    departure_airport: String,
    arrival_airport: String,
    departure_time: NaiveDateTime,
    arrival_time: NaiveDateTime,
    duration_minutes: u32,
    /// Technical stops without change of flight number.
    #[serde(default)]
    stops: u8,
}

impl Segment {
    /// Creates a segment; the duration is derived from the two local times
    /// and should be overridden with [`Segment::with_duration`] when the
    /// airports are in different time zones.
    #[must_use]
    pub fn new(
        carrier_code: impl Into<String>,
        flight_number: impl Into<String>,
        departure_airport: impl Into<String>,
        arrival_airport: impl Into<String>,
        departure_time: NaiveDateTime,
        arrival_time: NaiveDateTime,
    ) -> Self {
        let minutes = (arrival_time - departure_time).num_minutes();
        Self {
            carrier_code: carrier_code.into(),
            flight_number: flight_number.into(),
            departure_airport: departure_airport.into(),
            arrival_airport: arrival_airport.into(),
            departure_time,
            arrival_time,
            duration_minutes: u32::try_from(minutes).unwrap_or(0),
            stops: 0,
        }
    }

    /// Overrides the flown duration.
    #[must_use]
    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Sets the number of technical stops.
    #[must_use]
    pub fn with_stops(mut self, stops: u8) -> Self {
        self.stops = stops;
        self
    }

    /// Marketing carrier code.
    #[inline]
    #[must_use]
    pub fn carrier_code(&self) -> &str {
        &self.carrier_code
    }

    /// Flight number as published by the provider.
    #[inline]
    #[must_use]
    pub fn flight_number(&self) -> &str {
        &self.flight_number
    }

    /// Departure airport code.
    #[inline]
    #[must_use]
    pub fn departure_airport(&self) -> &str {
        &self.departure_airport
    }

    /// Arrival airport code.
    #[inline]
    #[must_use]
    pub fn arrival_airport(&self) -> &str {
        &self.arrival_airport
    }

    /// Local departure time.
    #[inline]
    #[must_use]
    pub fn departure_time(&self) -> NaiveDateTime {
        self.departure_time
    }

    /// Local arrival time.
    #[inline]
    #[must_use]
    pub fn arrival_time(&self) -> NaiveDateTime {
        self.arrival_time
    }

    /// Flown duration in minutes.
    #[inline]
    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Technical stops.
    #[inline]
    #[must_use]
    pub fn stops(&self) -> u8 {
        self.stops
    }

    /// Carrier and flight number normalized for identity comparison:
    /// uppercase, carrier prefix and leading zeros removed from the number.
    #[must_use]
    pub fn normalized_flight(&self) -> String {
        let carrier = self.carrier_code.trim().to_ascii_uppercase();
        let raw = self.flight_number.trim().to_ascii_uppercase();
        let number = raw.strip_prefix(carrier.as_str()).unwrap_or(&raw).trim();
        let digits = number.trim_start_matches('0');
        let number = if digits.is_empty() && !number.is_empty() {
            "0"
        } else {
            digits
        };
        format!("{carrier}{number}")
    }
}

/// Ordered sequence of segments travelled in one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    segments: Vec<Segment>,
}

impl Itinerary {
    /// Creates an itinerary.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidField` if `segments` is empty.
    pub fn new(segments: Vec<Segment>) -> DomainResult<Self> {
        if segments.is_empty() {
            return Err(DomainError::invalid_field(
                "itinerary",
                "at least one segment required",
            ));
        }
        Ok(Self { segments })
    }

    /// The segments in travel order.
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// First departure airport.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.first().map_or("", Segment::departure_airport)
    }

    /// Final arrival airport.
    #[must_use]
    pub fn destination(&self) -> &str {
        self.last().map_or("", Segment::arrival_airport)
    }

    /// Local departure time of the first segment.
    #[must_use]
    pub fn departure_time(&self) -> Option<NaiveDateTime> {
        self.first().map(Segment::departure_time)
    }

    /// Connections plus technical stops.
    #[must_use]
    pub fn stop_count(&self) -> u32 {
        let connections = u32::try_from(self.segments.len().saturating_sub(1)).unwrap_or(u32::MAX);
        let technical: u32 = self.segments.iter().map(|s| u32::from(s.stops())).sum();
        connections.saturating_add(technical)
    }

    /// Flown minutes plus connection time between segments.
    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        let flown: u32 = self.segments.iter().map(Segment::duration_minutes).sum();
        let layovers: i64 = self
            .segments
            .windows(2)
            .filter_map(|pair| match pair {
                [a, b] => Some((b.departure_time() - a.arrival_time()).num_minutes().max(0)),
                _ => None,
            })
            .sum();
        flown.saturating_add(u32::try_from(layovers).unwrap_or(0))
    }

    fn identity(&self) -> String {
        let flights: Vec<String> = self.segments.iter().map(Segment::normalized_flight).collect();
        let departure = self
            .departure_time()
            .map(|t| round_to_minute(t).format("%Y-%m-%dT%H:%M").to_string())
            .unwrap_or_default();
        format!(
            "{}-{}:{}@{}",
            self.origin().trim().to_ascii_uppercase(),
            self.destination().trim().to_ascii_uppercase(),
            flights.join("/"),
            departure
        )
    }
}

/// Nearest minute; 30 seconds and above round up.
fn round_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.checked_add_signed(TimeDelta::seconds(30)).unwrap_or(t)
}

/// Price components of an offer for all passengers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    base: Decimal,
    taxes: Decimal,
    fees: Decimal,
    total: Decimal,
    currency: CurrencyCode,
}

impl PriceBreakdown {
    /// Creates a breakdown whose total is the sum of its components.
    #[must_use]
    pub fn new(base: Decimal, taxes: Decimal, fees: Decimal, currency: CurrencyCode) -> Self {
        Self {
            base,
            taxes,
            fees,
            total: base + taxes + fees,
            currency,
        }
    }

    /// Creates a breakdown with a provider-stated total.
    ///
    /// Providers sometimes round components independently, so the total is
    /// taken as authoritative.
    #[must_use]
    pub fn with_total(
        base: Decimal,
        taxes: Decimal,
        fees: Decimal,
        total: Decimal,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            base,
            taxes,
            fees,
            total,
            currency,
        }
    }

    /// Base fare.
    #[inline]
    #[must_use]
    pub fn base(&self) -> Decimal {
        self.base
    }

    /// Taxes.
    #[inline]
    #[must_use]
    pub fn taxes(&self) -> Decimal {
        self.taxes
    }

    /// Fees.
    #[inline]
    #[must_use]
    pub fn fees(&self) -> Decimal {
        self.fees
    }

    /// Amount payable.
    #[inline]
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Pricing currency.
    #[inline]
    #[must_use]
    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }
}

/// Another provider selling the same flight as a canonical offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternateProvider {
    /// The provider.
    pub provider: ProviderId,
    /// That provider's offer id.
    pub offer_id: OfferId,
    /// That provider's total price.
    pub total_price: Decimal,
}

/// Normalized identity of "the same flight" across providers.
///
/// Built from route, carrier, flight number and departure time rounded to
/// the nearest minute, for every itinerary of the offer. Seconds are
/// dropped after rounding, so 10:00:59 and 10:01:00 share a key while
/// 10:00:29 and 10:00:30 do not.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    /// Returns the key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A priced flight offer from a single provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightOffer {
    id: OfferId,
    provider: ProviderId,
    price: PriceBreakdown,
    itineraries: Vec<Itinerary>,
    #[serde(default)]
    available_seats: Option<u16>,
    #[serde(default)]
    validating_airline: Option<String>,
    #[serde(default)]
    cabin_class: CabinClass,
    #[serde(default)]
    fare_class: Option<String>,
    #[serde(default)]
    booking_class: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    alternate_providers: Vec<AlternateProvider>,
}

impl FlightOffer {
    /// Creates an offer.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidField` if there are no itineraries or the
    /// total price is negative.
    pub fn new(
        id: OfferId,
        provider: ProviderId,
        price: PriceBreakdown,
        itineraries: Vec<Itinerary>,
    ) -> DomainResult<Self> {
        if itineraries.is_empty() {
            return Err(DomainError::invalid_field(
                "itineraries",
                "at least one itinerary required",
            ));
        }
        if price.total().is_sign_negative() {
            return Err(DomainError::invalid_field("price", "total is negative"));
        }
        Ok(Self {
            id,
            provider,
            price,
            itineraries,
            available_seats: None,
            validating_airline: None,
            cabin_class: CabinClass::default(),
            fare_class: None,
            booking_class: None,
            alternate_providers: Vec::new(),
        })
    }

    /// Sets the number of seats still for sale.
    #[must_use]
    pub fn with_available_seats(mut self, seats: u16) -> Self {
        self.available_seats = Some(seats);
        self
    }

    /// Sets the validating (ticketing) airline.
    #[must_use]
    pub fn with_validating_airline(mut self, airline: impl Into<String>) -> Self {
        self.validating_airline = Some(airline.into());
        self
    }

    /// Sets the cabin.
    #[must_use]
    pub fn with_cabin_class(mut self, cabin: CabinClass) -> Self {
        self.cabin_class = cabin;
        self
    }

    /// Sets the fare basis and booking class.
    #[must_use]
    pub fn with_fare_class(
        mut self,
        fare_class: impl Into<String>,
        booking_class: impl Into<String>,
    ) -> Self {
        self.fare_class = Some(fare_class.into());
        self.booking_class = Some(booking_class.into());
        self
    }

    /// Attributes the offer to `provider`.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.provider = provider;
        self
    }

    /// Returns a copy annotated with alternate providers, leaving `self`
    /// untouched.
    #[must_use]
    pub fn with_alternates(&self, alternates: Vec<AlternateProvider>) -> Self {
        let mut merged = self.clone();
        merged.alternate_providers = alternates;
        merged
    }

    /// Provider-local id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &OfferId {
        &self.id
    }

    /// Issuing provider.
    #[inline]
    #[must_use]
    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// Price breakdown.
    #[inline]
    #[must_use]
    pub fn price(&self) -> &PriceBreakdown {
        &self.price
    }

    /// Amount payable.
    #[inline]
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.price.total()
    }

    /// Itineraries in travel order (outbound first).
    #[inline]
    #[must_use]
    pub fn itineraries(&self) -> &[Itinerary] {
        &self.itineraries
    }

    /// Seats still for sale, when published.
    #[inline]
    #[must_use]
    pub fn available_seats(&self) -> Option<u16> {
        self.available_seats
    }

    /// Validating airline, when published.
    #[inline]
    #[must_use]
    pub fn validating_airline(&self) -> Option<&str> {
        self.validating_airline.as_deref()
    }

    /// Cabin.
    #[inline]
    #[must_use]
    pub fn cabin_class(&self) -> CabinClass {
        self.cabin_class
    }

    /// Fare basis.
    #[inline]
    #[must_use]
    pub fn fare_class(&self) -> Option<&str> {
        self.fare_class.as_deref()
    }

    /// Booking (RBD) class.
    #[inline]
    #[must_use]
    pub fn booking_class(&self) -> Option<&str> {
        self.booking_class.as_deref()
    }

    /// Other providers selling the same flight.
    #[inline]
    #[must_use]
    pub fn alternate_providers(&self) -> &[AlternateProvider] {
        &self.alternate_providers
    }

    /// Outbound local departure time.
    #[must_use]
    pub fn departure_time(&self) -> Option<NaiveDateTime> {
        self.itineraries.first().and_then(Itinerary::departure_time)
    }

    /// Journey time summed over all itineraries.
    #[must_use]
    pub fn total_duration_minutes(&self) -> u32 {
        self.itineraries
            .iter()
            .map(Itinerary::duration_minutes)
            .fold(0, u32::saturating_add)
    }

    /// Stops summed over all itineraries.
    #[must_use]
    pub fn total_stops(&self) -> u32 {
        self.itineraries
            .iter()
            .map(Itinerary::stop_count)
            .fold(0, u32::saturating_add)
    }

    /// Identity used to recognize the same flight across providers.
    #[must_use]
    pub fn dedup_key(&self) -> DedupKey {
        let parts: Vec<String> = self.itineraries.iter().map(Itinerary::identity).collect();
        DedupKey(parts.join("|"))
    }

    /// True when the offer honours the search constraints: cabin, stop
    /// limit per itinerary, seat availability and trip shape.
    #[must_use]
    pub fn satisfies(&self, params: &FlightSearchParams) -> bool {
        if self.cabin_class != params.cabin_class() {
            return false;
        }
        if let Some(max) = params.effective_max_stops()
            && self
                .itineraries
                .iter()
                .any(|i| i.stop_count() > u32::from(max))
        {
            return false;
        }
        if let Some(seats) = self.available_seats
            && seats < params.seats_required()
        {
            return false;
        }
        let expected_legs = if params.is_round_trip() { 2 } else { 1 };
        self.itineraries.len() == expected_legs
    }
}

impl fmt::Display for FlightOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FlightOffer({} via {} @ {} {})",
            self.dedup_key(),
            self.provider,
            self.price.total().round_dp(2),
            self.price.currency()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn offer(provider: &str, segments: Vec<Segment>, total: i64) -> FlightOffer {
        FlightOffer::new(
            OfferId::new(format!("{provider}-1")),
            ProviderId::new(provider),
            PriceBreakdown::new(Decimal::new(total, 0), Decimal::ZERO, Decimal::ZERO, CurrencyCode::usd()),
            vec![Itinerary::new(segments).unwrap()],
        )
        .unwrap()
    }

    mod dedup_key {
        use super::*;

        #[test]
        fn same_flight_from_different_providers_matches() {
            let a = offer("a", vec![Segment::new("AA", "123", "JFK", "LAX", at(10, 0, 0), at(13, 0, 0))], 200);
            let b = offer("b", vec![Segment::new("aa", "0123", "jfk", "lax", at(10, 0, 25), at(13, 0, 0))], 210);
            assert_eq!(a.dedup_key(), b.dedup_key());
        }

        #[test]
        fn departure_rounds_to_nearest_minute() {
            let key = |s: u32, m: u32| {
                offer("a", vec![Segment::new("AA", "123", "JFK", "LAX", at(10, m, s), at(13, 0, 0))], 200)
                    .dedup_key()
            };
            assert_eq!(key(59, 0), key(0, 1));
            assert_eq!(key(59, 0).as_str(), "JFK-LAX:AA123@2025-06-01T10:01");
            assert_eq!(key(29, 0).as_str(), "JFK-LAX:AA123@2025-06-01T10:00");
            assert_ne!(key(29, 0), key(30, 0));
        }

        #[test]
        fn carrier_prefixed_number_is_normalized() {
            let seg = Segment::new("DL", "DL0456", "JFK", "LAX", at(9, 0, 0), at(12, 0, 0));
            assert_eq!(seg.normalized_flight(), "DL456");
        }

        #[test]
        fn different_minute_is_different_flight() {
            let a = offer("a", vec![Segment::new("AA", "123", "JFK", "LAX", at(10, 0, 0), at(13, 0, 0))], 200);
            let b = offer("b", vec![Segment::new("AA", "123", "JFK", "LAX", at(10, 1, 0), at(13, 0, 0))], 200);
            assert_ne!(a.dedup_key(), b.dedup_key());
        }

        #[test]
        fn connections_are_part_of_identity() {
            let direct = offer("a", vec![Segment::new("AA", "1", "JFK", "LAX", at(8, 0, 0), at(11, 0, 0))], 300);
            let via = offer(
                "a",
                vec![
                    Segment::new("AA", "1", "JFK", "ORD", at(8, 0, 0), at(9, 30, 0)),
                    Segment::new("AA", "2", "ORD", "LAX", at(10, 30, 0), at(12, 30, 0)),
                ],
                300,
            );
            assert_ne!(direct.dedup_key(), via.dedup_key());
            assert_eq!(via.dedup_key().as_str(), "JFK-LAX:AA1/AA2@2025-06-01T08:00");
        }
    }

    mod itinerary {
        use super::*;

        #[test]
        fn empty_itinerary_rejected() {
            assert!(Itinerary::new(vec![]).is_err());
        }

        #[test]
        fn stops_and_duration_include_connections() {
            let it = Itinerary::new(vec![
                Segment::new("AA", "1", "JFK", "ORD", at(8, 0, 0), at(9, 30, 0)),
                Segment::new("AA", "2", "ORD", "LAX", at(10, 30, 0), at(12, 30, 0)).with_stops(1),
            ])
            .unwrap();
            assert_eq!(it.stop_count(), 2);
            assert_eq!(it.duration_minutes(), 90 + 60 + 120);
            assert_eq!(it.origin(), "JFK");
            assert_eq!(it.destination(), "LAX");
        }
    }

    mod constraints {
        use super::*;

        fn params(direct: bool) -> FlightSearchParams {
            FlightSearchParams::builder("JFK", "LAX", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
                .adults(2)
                .direct_only(direct)
                .build()
                .unwrap()
        }

        #[test]
        fn direct_only_rejects_connections() {
            let via = offer(
                "a",
                vec![
                    Segment::new("AA", "1", "JFK", "ORD", at(8, 0, 0), at(9, 30, 0)),
                    Segment::new("AA", "2", "ORD", "LAX", at(10, 30, 0), at(12, 30, 0)),
                ],
                300,
            );
            assert!(!via.satisfies(&params(true)));
            assert!(via.satisfies(&params(false)));
        }

        #[test]
        fn insufficient_seats_rejected() {
            let o = offer("a", vec![Segment::new("AA", "1", "JFK", "LAX", at(8, 0, 0), at(11, 0, 0))], 300)
                .with_available_seats(1);
            assert!(!o.satisfies(&params(false)));
        }

        #[test]
        fn cabin_mismatch_rejected() {
            let o = offer("a", vec![Segment::new("AA", "1", "JFK", "LAX", at(8, 0, 0), at(11, 0, 0))], 300)
                .with_cabin_class(CabinClass::First);
            assert!(!o.satisfies(&params(false)));
        }
    }

    #[test]
    fn with_alternates_copies() {
        let original = offer("a", vec![Segment::new("AA", "1", "JFK", "LAX", at(8, 0, 0), at(11, 0, 0))], 300);
        let merged = original.with_alternates(vec![AlternateProvider {
            provider: ProviderId::new("b"),
            offer_id: OfferId::new("b-1"),
            total_price: Decimal::new(300, 0),
        }]);
        assert!(original.alternate_providers().is_empty());
        assert_eq!(merged.alternate_providers().len(), 1);
    }

    #[test]
    fn negative_total_rejected() {
        let result = FlightOffer::new(
            OfferId::new("x"),
            ProviderId::new("a"),
            PriceBreakdown::new(Decimal::new(-1, 0), Decimal::ZERO, Decimal::ZERO, CurrencyCode::usd()),
            vec![Itinerary::new(vec![Segment::new("AA", "1", "JFK", "LAX", at(8, 0, 0), at(11, 0, 0))]).unwrap()],
        );
        assert!(result.is_err());
    }
}
