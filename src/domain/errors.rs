//! # Domain Errors
//!
//! Validation failures raised while constructing domain values.

use thiserror::Error;

/// Error type for domain validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A field failed validation.
    #[error("invalid {field}: {message}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// A combination of fields is inconsistent.
    #[error("invalid search: {0}")]
    InvalidSearch(String),
}

impl DomainError {
    /// Creates a field validation error.
    #[must_use]
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }

    /// Creates a cross-field validation error.
    #[must_use]
    pub fn invalid_search(message: impl Into<String>) -> Self {
        Self::InvalidSearch(message.into())
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_field() {
        let err = DomainError::invalid_field("origin", "must be 3 letters");
        assert_eq!(err.to_string(), "invalid origin: must be 3 letters");
    }

    #[test]
    fn invalid_search_display() {
        let err = DomainError::invalid_search("origin and destination are equal");
        assert_eq!(err.to_string(), "invalid search: origin and destination are equal");
    }
}
