//! Core library for the weather relay service.
//!
//! This crate defines:
//! - Configuration handling (file + environment, credential included)
//! - The typed error taxonomy for upstream failures
//! - The upstream client abstraction and its OpenWeather implementation
//!
//! It is used by `relay-server`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod model;
pub mod upstream;

pub use config::{Config, RetryPolicy};
pub use error::RelayError;
pub use model::WeatherQuery;
pub use upstream::{OpenWeatherUpstream, WeatherUpstream};
