use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::{
    config::{Config, RetryPolicy},
    error::RelayError,
    model::WeatherQuery,
};

use super::WeatherUpstream;

/// Client for the OpenWeather current-weather endpoint.
///
/// One outbound GET per call, bounded by the configured timeout; transient
/// failures are retried with exponential backoff before a typed error is
/// returned.
#[derive(Debug, Clone)]
pub struct OpenWeatherUpstream {
    url: String,
    api_key: String,
    timeout: Duration,
    retry: RetryPolicy,
    http: Client,
}

impl OpenWeatherUpstream {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build the upstream HTTP client")?;

        Ok(Self {
            url: config.upstream_url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            retry: config.retry,
            http,
        })
    }

    async fn fetch_once(&self, query: &WeatherQuery) -> Result<Bytes, RelayError> {
        let location = query.location();

        let res = self
            .http
            .get(&self.url)
            .query(&[("q", location.as_str()), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|err| RelayError::from_transport(err, self.timeout))?;

        let status = res.status();
        let body = res
            .bytes()
            .await
            .map_err(|err| RelayError::from_transport(err, self.timeout))?;

        if !status.is_success() {
            return Err(RelayError::UpstreamStatus {
                status,
                detail: truncate_body(&String::from_utf8_lossy(&body)),
            });
        }

        // The payload is relayed as-is; decoding only proves it is JSON.
        if let Err(err) = serde_json::from_slice::<serde_json::Value>(&body) {
            return Err(RelayError::MalformedBody { detail: err.to_string() });
        }

        Ok(body)
    }
}

#[async_trait]
impl WeatherUpstream for OpenWeatherUpstream {
    async fn current_weather(&self, query: &WeatherQuery) -> Result<Bytes, RelayError> {
        let mut attempt = 0;

        loop {
            match self.fetch_once(query).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying upstream request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;

    if body.len() <= MAX {
        return body.to_string();
    }

    let mut cut = MAX;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &body[..cut])
}
