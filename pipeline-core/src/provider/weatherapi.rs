use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::{
    error::{PipelineError, Result, TransportError},
    model::{DATE_FORMAT, FetchResult, ForecastQuery, Location, flag_str},
};

use super::WeatherProvider;

/// HTTP client for a WeatherAPI.com-compatible service.
///
/// Requests are `GET {base_url}history.json` and `GET {base_url}forecast.json`,
/// keyed by the API key passed as the `key` query parameter.
#[derive(Clone)]
pub struct WeatherApiClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl std::fmt::Debug for WeatherApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WeatherApiClient<{}>", self.base_url)
    }
}

impl WeatherApiClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            PipelineError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self { api_key, base_url, http })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url.trim_end_matches('/'))
    }

    async fn send(
        &self,
        name: &str,
        params: &[(&str, String)],
    ) -> Result<FetchResult, TransportError> {
        let url = self.endpoint(name);
        debug!(%url, ?params, "requesting weather document");

        // `without_url` keeps the API key out of error messages.
        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| {
                let cause = e.without_url();
                TransportError::new(0, format!("failed to send request to {url}: {cause}"))
            })?;

        let status = res.status().as_u16();
        let body = res.text().await.map_err(|e| {
            let cause = e.without_url();
            TransportError::new(status, format!("failed to read response body: {cause}"))
        })?;

        if !(200..=299).contains(&status) {
            let payload = serde_json::from_str(&body)
                .unwrap_or_else(|_| Value::String(truncate_body(&body)));
            return Ok(FetchResult::new(payload, status));
        }

        let payload: Value = serde_json::from_str(&body).map_err(|e| {
            TransportError::new(
                status,
                format!("failed to parse response JSON ({e}): {}", truncate_body(&body)),
            )
        })?;

        Ok(FetchResult::new(payload, status))
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiClient {
    async fn fetch_history(
        &self,
        date: NaiveDate,
        location: &Location,
    ) -> Result<FetchResult, TransportError> {
        self.send(
            "history.json",
            &[
                ("q", location.to_string()),
                ("dt", date.format(DATE_FORMAT).to_string()),
            ],
        )
        .await
    }

    async fn fetch_forecast(&self, query: &ForecastQuery) -> Result<FetchResult, TransportError> {
        self.send(
            "forecast.json",
            &[
                ("q", query.location.to_string()),
                ("days", query.options.forecast_days.to_string()),
                ("aqi", flag_str(query.options.include_air_quality).to_string()),
                ("alerts", flag_str(query.options.include_alerts).to_string()),
            ],
        )
        .await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
