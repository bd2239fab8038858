use async_trait::async_trait;
use chrono::NaiveDate;
use std::{fmt::Debug, time::Duration};

use crate::{
    config::Settings,
    error::{Result, TransportError},
    model::{FetchResult, ForecastOptions, ForecastQuery, Location},
};

pub mod retry;
pub mod weatherapi;

pub use retry::RetryingProvider;
pub use weatherapi::WeatherApiClient;

/// A source of weather documents.
///
/// Implementations perform exactly one outbound call per invocation. A
/// well-formed HTTP error response is a normal [`FetchResult`] with a non-2xx
/// status; only connection-level failures are [`TransportError`]s.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_history(
        &self,
        date: NaiveDate,
        location: &Location,
    ) -> Result<FetchResult, TransportError>;

    async fn fetch_forecast(&self, query: &ForecastQuery) -> Result<FetchResult, TransportError>;

    /// Validate textual forecast arguments, then fetch. Invalid arguments fail
    /// before any network call is made.
    async fn forecast(
        &self,
        location: &Location,
        date: NaiveDate,
        days: u32,
        alerts: &str,
        air_quality: &str,
    ) -> Result<FetchResult> {
        let options = ForecastOptions::parse(days, alerts, air_quality)?;
        let query = ForecastQuery::new(date, location.clone(), options);
        Ok(self.fetch_forecast(&query).await?)
    }
}

/// First retry delay; doubled on every further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Construct the HTTP provider from validated settings, wrapped in the retry
/// decorator when retries are configured.
pub fn provider_from_settings(settings: &Settings) -> Result<Box<dyn WeatherProvider>> {
    let client = WeatherApiClient::new(
        settings.api_key.clone(),
        settings.api_base_url.clone(),
        settings.timeout,
    )?;

    let boxed: Box<dyn WeatherProvider> = if settings.max_retries > 0 {
        Box::new(RetryingProvider::new(client, settings.max_retries, RETRY_BASE_DELAY))
    } else {
        Box::new(client)
    };

    Ok(boxed)
}
