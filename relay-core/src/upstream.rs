use crate::{RelayError, WeatherQuery};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;

pub mod openweather;

pub use openweather::OpenWeatherUpstream;

/// Outbound side of the relay.
///
/// The HTTP layer depends on this trait rather than on a concrete client so
/// handlers can be exercised against a test double.
#[async_trait]
pub trait WeatherUpstream: Send + Sync + Debug {
    /// Fetch current weather for `query`, returning the upstream body verbatim.
    async fn current_weather(&self, query: &WeatherQuery) -> Result<Bytes, RelayError>;
}
