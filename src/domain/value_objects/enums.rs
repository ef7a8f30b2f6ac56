//! # Domain Enums
//!
//! Enumeration types shared across the aggregation core:
//!
//! - [`CabinClass`] - Requested/offered cabin
//! - [`ProviderType`] - Adapter variant used to reach a provider
//! - [`ProviderEnvironment`] - Sandbox or production endpoint
//! - [`ProviderFeature`] - Optional capabilities advertised by a provider
//! - [`SortOption`] - Ordering applied to aggregated offers
//!
//! All enums implement `Display`, `FromStr` and Serde traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cabin class of a fare.
///
/// # Examples
///
/// ```
/// use flight_aggregator::domain::value_objects::enums::CabinClass;
///
/// let cabin: CabinClass = "premium-economy".parse().unwrap();
/// assert_eq!(cabin, CabinClass::PremiumEconomy);
/// assert_eq!(cabin.to_string(), "PREMIUM_ECONOMY");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    /// Economy cabin.
    #[default]
    Economy,
    /// Premium economy cabin.
    PremiumEconomy,
    /// Business cabin.
    Business,
    /// First cabin.
    First,
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Economy => "ECONOMY",
            Self::PremiumEconomy => "PREMIUM_ECONOMY",
            Self::Business => "BUSINESS",
            Self::First => "FIRST",
        };
        f.write_str(s)
    }
}

impl FromStr for CabinClass {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "ECONOMY" | "Y" => Ok(Self::Economy),
            "PREMIUM_ECONOMY" | "PREMIUMECONOMY" | "W" => Ok(Self::PremiumEconomy),
            "BUSINESS" | "C" => Ok(Self::Business),
            "FIRST" | "F" => Ok(Self::First),
            _ => Err(ParseEnumError::InvalidValue("CabinClass", s.to_string())),
        }
    }
}

/// Adapter variant used to talk to a provider.
///
/// The adapter factory dispatches on this tag; there is no adapter
/// inheritance hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Generic JSON-over-HTTP aggregator/GDS gateway.
    RestJson,
    /// In-process fixture provider serving preconfigured offers.
    Fixture,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RestJson => write!(f, "rest_json"),
            Self::Fixture => write!(f, "fixture"),
        }
    }
}

impl FromStr for ProviderType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "rest_json" | "rest" => Ok(Self::RestJson),
            "fixture" => Ok(Self::Fixture),
            _ => Err(ParseEnumError::InvalidValue("ProviderType", s.to_string())),
        }
    }
}

/// Provider endpoint environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderEnvironment {
    /// Test/sandbox endpoints.
    #[default]
    Sandbox,
    /// Live endpoints.
    Production,
}

impl fmt::Display for ProviderEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl FromStr for ProviderEnvironment {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sandbox" | "test" => Ok(Self::Sandbox),
            "production" | "prod" | "live" => Ok(Self::Production),
            _ => Err(ParseEnumError::InvalidValue(
                "ProviderEnvironment",
                s.to_string(),
            )),
        }
    }
}

/// Optional capability advertised in a provider's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFeature {
    /// Flight offer search.
    FlightSearch,
    /// Airport/location lookup.
    AirportSearch,
    /// Round-trip itineraries.
    RoundTrip,
    /// Premium cabins beyond economy.
    PremiumCabins,
}

impl fmt::Display for ProviderFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FlightSearch => "flight_search",
            Self::AirportSearch => "airport_search",
            Self::RoundTrip => "round_trip",
            Self::PremiumCabins => "premium_cabins",
        };
        f.write_str(s)
    }
}

/// Ordering applied to the deduplicated offer list.
///
/// Every option ends with the same deterministic fallback chain
/// (price, dedup key, provider name), see the result aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    /// Cheapest first.
    #[default]
    Price,
    /// Most expensive first.
    PriceDesc,
    /// Shortest total journey time first.
    Duration,
    /// Earliest departure first.
    Departure,
    /// Fewest stops first.
    Stops,
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Price => "price",
            Self::PriceDesc => "price_desc",
            Self::Duration => "duration",
            Self::Departure => "departure",
            Self::Stops => "stops",
        };
        f.write_str(s)
    }
}

impl FromStr for SortOption {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "price" | "price_asc" | "cheapest" => Ok(Self::Price),
            "price_desc" => Ok(Self::PriceDesc),
            "duration" | "fastest" => Ok(Self::Duration),
            "departure" | "earliest" => Ok(Self::Departure),
            "stops" => Ok(Self::Stops),
            _ => Err(ParseEnumError::InvalidValue("SortOption", s.to_string())),
        }
    }
}

/// Error type for parsing enum values from strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEnumError {
    /// The provided string value is not valid for the enum.
    InvalidValue(&'static str, String),
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue(enum_name, value) => {
                write!(f, "invalid {} value: '{}'", enum_name, value)
            }
        }
    }
}

impl std::error::Error for ParseEnumError {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod cabin_class {
        use super::*;

        #[test]
        fn parses_codes_and_names() {
            assert_eq!("economy".parse::<CabinClass>().unwrap(), CabinClass::Economy);
            assert_eq!("C".parse::<CabinClass>().unwrap(), CabinClass::Business);
            assert_eq!(
                "premium_economy".parse::<CabinClass>().unwrap(),
                CabinClass::PremiumEconomy
            );
            assert!("steerage".parse::<CabinClass>().is_err());
        }

        #[test]
        fn serde_uses_screaming_snake_case() {
            let json = serde_json::to_string(&CabinClass::PremiumEconomy).unwrap();
            assert_eq!(json, "\"PREMIUM_ECONOMY\"");
        }
    }

    mod provider_type {
        use super::*;

        #[test]
        fn round_trips_through_display() {
            for t in [ProviderType::RestJson, ProviderType::Fixture] {
                assert_eq!(t.to_string().parse::<ProviderType>().unwrap(), t);
            }
        }
    }

    mod sort_option {
        use super::*;

        #[test]
        fn default_is_price() {
            assert_eq!(SortOption::default(), SortOption::Price);
        }

        #[test]
        fn parses_aliases() {
            assert_eq!("cheapest".parse::<SortOption>().unwrap(), SortOption::Price);
            assert_eq!("price-desc".parse::<SortOption>().unwrap(), SortOption::PriceDesc);
            assert_eq!("fastest".parse::<SortOption>().unwrap(), SortOption::Duration);
        }

        #[test]
        fn parse_error_names_enum() {
            let err = "random".parse::<SortOption>().unwrap_err();
            assert!(err.to_string().contains("SortOption"));
        }
    }

    #[test]
    fn environment_parses_aliases() {
        assert_eq!(
            "prod".parse::<ProviderEnvironment>().unwrap(),
            ProviderEnvironment::Production
        );
        assert_eq!(ProviderEnvironment::default(), ProviderEnvironment::Sandbox);
    }
}
