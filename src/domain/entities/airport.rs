//! # Airport Entity

use crate::domain::errors::DomainResult;
use crate::domain::value_objects::search_params::normalize_iata;
use serde::{Deserialize, Serialize};

/// An airport returned by location lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Airport {
    iata_code: String,
    name: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
}

impl Airport {
    /// Creates an airport with a normalized IATA code.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidField` for a malformed code.
    pub fn new(iata_code: &str, name: impl Into<String>) -> DomainResult<Self> {
        Ok(Self {
            iata_code: normalize_iata("iata_code", iata_code)?,
            name: name.into(),
            city: None,
            country_code: None,
        })
    }

    /// Sets city and country.
    #[must_use]
    pub fn with_location(mut self, city: impl Into<String>, country_code: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self.country_code = Some(country_code.into());
        self
    }

    /// IATA code.
    #[inline]
    #[must_use]
    pub fn iata_code(&self) -> &str {
        &self.iata_code
    }

    /// Airport name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// City served.
    #[inline]
    #[must_use]
    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    /// ISO country code.
    #[inline]
    #[must_use]
    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }

    /// Case-insensitive match on code, name or city.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        self.iata_code.to_lowercase().starts_with(&q)
            || self.name.to_lowercase().contains(&q)
            || self.city.as_deref().is_some_and(|c| c.to_lowercase().contains(&q))
    }
}
