//! # Search Parameters
//!
//! Immutable inputs to a single flight or airport search.
//!
//! # Examples
//!
//! ```
//! use flight_aggregator::domain::value_objects::search_params::FlightSearchParams;
//! use flight_aggregator::domain::value_objects::enums::CabinClass;
//! use chrono::NaiveDate;
//!
//! let params = FlightSearchParams::builder("jfk", "lax", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
//!     .adults(2)
//!     .cabin_class(CabinClass::Business)
//!     .direct_only(true)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(params.origin(), "JFK");
//! assert_eq!(params.effective_max_stops(), Some(0));
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::enums::CabinClass;
use crate::domain::value_objects::money::CurrencyCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maximum passengers in a single search.
pub const MAX_PASSENGERS: u8 = 9;

/// Default cap on returned offers.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Validates and normalizes a 3-letter IATA location code.
///
/// # Errors
///
/// Returns `DomainError::InvalidField` if the code is not three ASCII letters.
pub fn normalize_iata(field: &'static str, code: &str) -> DomainResult<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::invalid_field(
            field,
            format!("'{code}' is not an IATA code"),
        ));
    }
    Ok(code.to_ascii_uppercase())
}

/// Parameters of a flight availability search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearchParams {
    origin: String,
    destination: String,
    departure_date: NaiveDate,
    #[serde(default)]
    return_date: Option<NaiveDate>,
    #[serde(default = "default_adults")]
    adults: u8,
    #[serde(default)]
    children: u8,
    #[serde(default)]
    infants: u8,
    #[serde(default)]
    cabin_class: CabinClass,
    #[serde(default)]
    direct_flights_only: bool,
    #[serde(default)]
    max_stops: Option<u8>,
    #[serde(default)]
    currency: CurrencyCode,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_adults() -> u8 {
    1
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl FlightSearchParams {
    /// Starts a builder for a one-way economy search for one adult.
    #[must_use]
    pub fn builder(
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure_date: NaiveDate,
    ) -> FlightSearchParamsBuilder {
        FlightSearchParamsBuilder {
            params: Self {
                origin: origin.into(),
                destination: destination.into(),
                departure_date,
                return_date: None,
                adults: default_adults(),
                children: 0,
                infants: 0,
                cabin_class: CabinClass::default(),
                direct_flights_only: false,
                max_stops: None,
                currency: CurrencyCode::default(),
                max_results: DEFAULT_MAX_RESULTS,
            },
        }
    }

    /// Validates the parameters.
    ///
    /// Deserialized parameters bypass the builder; see [`Self::normalized`].
    ///
    /// # Errors
    ///
    /// Returns a `DomainError` describing the first violated rule.
    pub fn validate(&self) -> DomainResult<()> {
        let origin = normalize_iata("origin", &self.origin)?;
        let destination = normalize_iata("destination", &self.destination)?;
        if origin == destination {
            return Err(DomainError::invalid_search(
                "origin and destination must differ",
            ));
        }
        if let Some(ret) = self.return_date
            && ret < self.departure_date
        {
            return Err(DomainError::invalid_search(
                "return date precedes departure date",
            ));
        }
        if self.adults == 0 {
            return Err(DomainError::invalid_field(
                "adults",
                "at least one adult is required",
            ));
        }
        if self.infants > self.adults {
            return Err(DomainError::invalid_field(
                "infants",
                "each infant must travel with an adult",
            ));
        }
        if self.total_passengers() > u16::from(MAX_PASSENGERS) {
            return Err(DomainError::invalid_search(format!(
                "at most {MAX_PASSENGERS} passengers per search"
            )));
        }
        if self.direct_flights_only && self.max_stops.is_some_and(|s| s > 0) {
            return Err(DomainError::invalid_search(
                "direct-only search cannot allow stops",
            ));
        }
        if self.max_results == 0 {
            return Err(DomainError::invalid_field("maxResults", "must be at least 1"));
        }
        Ok(())
    }

    /// Uppercases location codes and validates.
    ///
    /// # Errors
    ///
    /// Returns a `DomainError` describing the first violated rule.
    pub fn normalized(mut self) -> DomainResult<Self> {
        self.origin = normalize_iata("origin", &self.origin)?;
        self.destination = normalize_iata("destination", &self.destination)?;
        self.validate()?;
        Ok(self)
    }

    /// Origin IATA code (uppercase once normalized).
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Destination IATA code.
    #[inline]
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Outbound date.
    #[inline]
    #[must_use]
    pub fn departure_date(&self) -> NaiveDate {
        self.departure_date
    }

    /// Inbound date for round trips.
    #[inline]
    #[must_use]
    pub fn return_date(&self) -> Option<NaiveDate> {
        self.return_date
    }

    /// True when a return date is set.
    #[inline]
    #[must_use]
    pub fn is_round_trip(&self) -> bool {
        self.return_date.is_some()
    }

    /// Adult passenger count.
    #[inline]
    #[must_use]
    pub fn adults(&self) -> u8 {
        self.adults
    }

    /// Child passenger count.
    #[inline]
    #[must_use]
    pub fn children(&self) -> u8 {
        self.children
    }

    /// Infant (lap) passenger count.
    #[inline]
    #[must_use]
    pub fn infants(&self) -> u8 {
        self.infants
    }

    /// All passengers including infants.
    #[must_use]
    pub fn total_passengers(&self) -> u16 {
        u16::from(self.adults) + u16::from(self.children) + u16::from(self.infants)
    }

    /// Seats required; infants travel on laps.
    #[must_use]
    pub fn seats_required(&self) -> u16 {
        u16::from(self.adults) + u16::from(self.children)
    }

    /// Requested cabin.
    #[inline]
    #[must_use]
    pub fn cabin_class(&self) -> CabinClass {
        self.cabin_class
    }

    /// True when only non-stop flights are wanted.
    #[inline]
    #[must_use]
    pub fn direct_flights_only(&self) -> bool {
        self.direct_flights_only
    }

    /// Configured stop limit, ignoring the direct-only flag.
    #[inline]
    #[must_use]
    pub fn max_stops(&self) -> Option<u8> {
        self.max_stops
    }

    /// Stop limit after folding in the direct-only flag.
    #[must_use]
    pub fn effective_max_stops(&self) -> Option<u8> {
        if self.direct_flights_only {
            Some(0)
        } else {
            self.max_stops
        }
    }

    /// Requested pricing currency.
    #[inline]
    #[must_use]
    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    /// Cap on returned offers.
    #[inline]
    #[must_use]
    pub fn max_results(&self) -> usize {
        self.max_results
    }
}

/// Builder for [`FlightSearchParams`].
#[derive(Debug, Clone)]
pub struct FlightSearchParamsBuilder {
    params: FlightSearchParams,
}

impl FlightSearchParamsBuilder {
    /// Sets the return date.
    #[must_use]
    pub fn return_date(mut self, date: NaiveDate) -> Self {
        self.params.return_date = Some(date);
        self
    }

    /// Sets the adult count.
    #[must_use]
    pub fn adults(mut self, n: u8) -> Self {
        self.params.adults = n;
        self
    }

    /// Sets the child count.
    #[must_use]
    pub fn children(mut self, n: u8) -> Self {
        self.params.children = n;
        self
    }

    /// Sets the infant count.
    #[must_use]
    pub fn infants(mut self, n: u8) -> Self {
        self.params.infants = n;
        self
    }

    /// Sets the cabin class.
    #[must_use]
    pub fn cabin_class(mut self, cabin: CabinClass) -> Self {
        self.params.cabin_class = cabin;
        self
    }

    /// Restricts to non-stop flights.
    #[must_use]
    pub fn direct_only(mut self, direct: bool) -> Self {
        self.params.direct_flights_only = direct;
        self
    }

    /// Sets the maximum number of stops.
    #[must_use]
    pub fn max_stops(mut self, stops: u8) -> Self {
        self.params.max_stops = Some(stops);
        self
    }

    /// Sets the pricing currency.
    #[must_use]
    pub fn currency(mut self, currency: CurrencyCode) -> Self {
        self.params.currency = currency;
        self
    }

    /// Sets the result cap.
    #[must_use]
    pub fn max_results(mut self, n: usize) -> Self {
        self.params.max_results = n;
        self
    }

    /// Normalizes location codes and validates.
    ///
    /// # Errors
    ///
    /// Returns a `DomainError` if any rule in
    /// [`FlightSearchParams::validate`] is violated.
    pub fn build(self) -> DomainResult<FlightSearchParams> {
        self.params.normalized()
    }
}

/// Parameters of an airport/location lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirportSearchParams {
    query: String,
    #[serde(default = "default_airport_limit")]
    limit: usize,
}

fn default_airport_limit() -> usize {
    10
}

impl AirportSearchParams {
    /// Creates a lookup for a keyword or code.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidField` if the trimmed query is shorter than
    /// two characters or `limit` is zero.
    pub fn new(query: impl Into<String>, limit: usize) -> DomainResult<Self> {
        let params = Self {
            query: query.into().trim().to_string(),
            limit,
        };
        params.validate()?;
        Ok(params)
    }

    /// Validates the lookup.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidField` for short queries or a zero limit.
    pub fn validate(&self) -> DomainResult<()> {
        if self.query.trim().chars().count() < 2 {
            return Err(DomainError::invalid_field(
                "query",
                "at least two characters required",
            ));
        }
        if self.limit == 0 {
            return Err(DomainError::invalid_field("limit", "must be at least 1"));
        }
        Ok(())
    }

    /// The search keyword.
    #[inline]
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Maximum results.
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Window applied to the sorted, deduplicated result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    /// Number of offers to skip.
    #[serde(default)]
    pub offset: usize,
    /// Page size; `None` returns everything after `offset`.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Pagination {
    /// A page starting at `offset` with `limit` entries.
    #[must_use]
    pub fn page(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod builder {
        use super::*;

        #[test]
        fn normalizes_codes() {
            let p = FlightSearchParams::builder(" jfk", "lax ", date(2025, 6, 1))
                .build()
                .unwrap();
            assert_eq!(p.origin(), "JFK");
            assert_eq!(p.destination(), "LAX");
            assert_eq!(p.adults(), 1);
            assert_eq!(p.max_results(), DEFAULT_MAX_RESULTS);
        }

        #[test]
        fn rejects_same_origin_and_destination() {
            let err = FlightSearchParams::builder("JFK", "jfk", date(2025, 6, 1))
                .build()
                .unwrap_err();
            assert!(matches!(err, DomainError::InvalidSearch(_)));
        }

        #[test]
        fn rejects_return_before_departure() {
            let result = FlightSearchParams::builder("JFK", "LAX", date(2025, 6, 10))
                .return_date(date(2025, 6, 1))
                .build();
            assert!(result.is_err());
        }

        #[test]
        fn rejects_more_infants_than_adults() {
            let result = FlightSearchParams::builder("JFK", "LAX", date(2025, 6, 1))
                .adults(1)
                .infants(2)
                .build();
            assert!(matches!(
                result,
                Err(DomainError::InvalidField { field: "infants", .. })
            ));
        }

        #[test]
        fn rejects_too_many_passengers() {
            let result = FlightSearchParams::builder("JFK", "LAX", date(2025, 6, 1))
                .adults(6)
                .children(4)
                .build();
            assert!(result.is_err());
        }

        #[test]
        fn rejects_direct_with_stops() {
            let result = FlightSearchParams::builder("JFK", "LAX", date(2025, 6, 1))
                .direct_only(true)
                .max_stops(1)
                .build();
            assert!(result.is_err());
        }

        #[test]
        fn rejects_bad_iata() {
            assert!(
                FlightSearchParams::builder("JF", "LAX", date(2025, 6, 1))
                    .build()
                    .is_err()
            );
            assert!(
                FlightSearchParams::builder("JFK", "L4X", date(2025, 6, 1))
                    .build()
                    .is_err()
            );
        }
    }

    #[test]
    fn seats_exclude_infants() {
        let p = FlightSearchParams::builder("JFK", "LAX", date(2025, 6, 1))
            .adults(2)
            .children(1)
            .infants(1)
            .build()
            .unwrap();
        assert_eq!(p.total_passengers(), 4);
        assert_eq!(p.seats_required(), 3);
    }

    #[test]
    fn deserialized_params_apply_defaults() {
        let json = r#"{"origin":"JFK","destination":"LAX","departureDate":"2025-06-01"}"#;
        let p: FlightSearchParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.adults(), 1);
        assert_eq!(p.currency().as_str(), "USD");
        assert!(p.validate().is_ok());
    }

    #[test]
    fn airport_params_require_query() {
        assert!(AirportSearchParams::new(" l ", 5).is_err());
        assert!(AirportSearchParams::new("lon", 0).is_err());
        assert_eq!(AirportSearchParams::new(" lon ", 5).unwrap().query(), "lon");
    }
}
