//! # Money
//!
//! ISO-4217 currency codes. Amounts are plain [`rust_decimal::Decimal`]
//! values paired with a [`CurrencyCode`] where they are stored.
//!
//! # Examples
//!
//! ```
//! use flight_aggregator::domain::value_objects::money::CurrencyCode;
//!
//! let usd = CurrencyCode::new("usd").unwrap();
//! assert_eq!(usd, CurrencyCode::usd());
//! assert!(CurrencyCode::new("dollars").is_err());
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-letter uppercase currency code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses and normalizes a currency code.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidField` unless the input is exactly three
    /// ASCII letters.
    pub fn new(code: impl AsRef<str>) -> DomainResult<Self> {
        let code = code.as_ref().trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::invalid_field(
                "currency",
                format!("'{code}' is not a 3-letter code"),
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// US dollar.
    #[must_use]
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    /// Returns the code as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::usd()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}
