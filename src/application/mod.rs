//! # Application Layer
//!
//! The aggregation core: eligibility, fan-out, failure isolation and
//! result merging, plus the runtime that wires them together.

pub mod error;
pub mod runtime;
pub mod services;

pub use error::{AggregateSearchError, ProviderFailure, SearchError, SearchResult};
pub use runtime::AggregatorRuntime;
