/// Location pair taken verbatim from the request path.
///
/// Both segments are forwarded to the upstream service without semantic
/// validation; the routing pattern already guarantees they are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    pub city: String,
    pub country: String,
}

impl WeatherQuery {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self { city: city.into(), country: country.into() }
    }

    /// Value of the `q` query parameter understood by the upstream API.
    pub fn location(&self) -> String {
        format!("{},{}", self.city, self.country)
    }
}
