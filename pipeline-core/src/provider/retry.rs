use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::warn;

use crate::{
    error::{Result, TransportError},
    model::{FetchResult, ForecastQuery, Location},
};

use super::WeatherProvider;

/// Retry-with-backoff decorator around any [`WeatherProvider`].
///
/// Transport failures, `429` and `5xx` responses are retried up to
/// `max_retries` extra times; the delay doubles after every attempt. The last
/// attempt's outcome is returned unchanged.
#[derive(Debug)]
pub struct RetryingProvider<P> {
    inner: P,
    max_retries: u32,
    base_delay: Duration,
}

impl<P: WeatherProvider> RetryingProvider<P> {
    pub fn new(inner: P, max_retries: u32, base_delay: Duration) -> Self {
        Self { inner, max_retries, base_delay }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    async fn with_retries<'a, F, Fut>(
        &'a self,
        what: &str,
        call: F,
    ) -> Result<FetchResult, TransportError>
    where
        F: Fn(&'a P) -> Fut,
        Fut: Future<Output = Result<FetchResult, TransportError>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = call(&self.inner).await;
            if attempt >= self.max_retries || !is_retryable(&outcome) {
                return outcome;
            }

            let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
            let status = match &outcome {
                Ok(result) => result.status_code,
                Err(e) => e.status_code,
            };
            warn!(what, attempt = attempt + 1, status, ?delay, "retrying weather request");

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn is_retryable(outcome: &Result<FetchResult, TransportError>) -> bool {
    match outcome {
        Ok(result) => result.status_code == 429 || (500..=599).contains(&result.status_code),
        Err(_) => true,
    }
}

#[async_trait]
impl<P: WeatherProvider> WeatherProvider for RetryingProvider<P> {
    async fn fetch_history(
        &self,
        date: NaiveDate,
        location: &Location,
    ) -> Result<FetchResult, TransportError> {
        self.with_retries("history", |p| p.fetch_history(date, location)).await
    }

    async fn fetch_forecast(&self, query: &ForecastQuery) -> Result<FetchResult, TransportError> {
        self.with_retries("forecast", |p| p.fetch_forecast(query)).await
    }
}
