//! # Infrastructure Layer
//!
//! Provider adapters, configuration storage, settings and logging.

pub mod config;
pub mod logging;
pub mod persistence;
pub mod providers;
