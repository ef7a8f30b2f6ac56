//! # Domain Layer
//!
//! Flight offers, search inputs and provider state, free of I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use errors::{DomainError, DomainResult};
