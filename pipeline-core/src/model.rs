use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

use crate::error::{PipelineError, Result};

/// Date format used in request parameters and artifact names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A tracked location: postcode, city name or a "lat,lon" pair.
///
/// The identifier becomes a path segment of every [`WriteTarget`], so path
/// separators and the `.`/`..` segments are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location(String);

impl Location {
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();

        if trimmed.is_empty() {
            return Err(PipelineError::InvalidArgument("location must not be empty".into()));
        }
        if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
            return Err(PipelineError::InvalidArgument(format!(
                "location '{trimmed}' must not contain path separators"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Location {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Location {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Location> for String {
    fn from(value: Location) -> Self {
        value.0
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| {
        PipelineError::InvalidArgument(format!("invalid date '{value}', expected YYYY-MM-DD: {e}"))
    })
}

/// Parse a "yes"/"no" flag, case-insensitively. `name` is used in the error.
pub fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err(PipelineError::InvalidArgument(format!(
            "invalid value '{value}' for '{name}': must be 'yes' or 'no'"
        ))),
    }
}

/// Wire form of a boolean flag.
pub(crate) fn flag_str(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastOptions {
    pub forecast_days: u32,
    pub include_alerts: bool,
    pub include_air_quality: bool,
}

impl ForecastOptions {
    pub fn new(
        forecast_days: u32,
        include_alerts: bool,
        include_air_quality: bool,
    ) -> Result<Self> {
        if forecast_days < 1 {
            return Err(PipelineError::InvalidArgument(
                "invalid value for 'days': must be greater than 0".into(),
            ));
        }

        Ok(Self { forecast_days, include_alerts, include_air_quality })
    }

    /// Build options from the textual flags accepted by the provider. Each flag
    /// is validated against its own input.
    pub fn parse(forecast_days: u32, alerts: &str, air_quality: &str) -> Result<Self> {
        let include_alerts = parse_flag("alerts", alerts)?;
        let include_air_quality = parse_flag("air_quality", air_quality)?;
        Self::new(forecast_days, include_alerts, include_air_quality)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastQuery {
    /// Issue date of the forecast; names the written artifact.
    pub date: NaiveDate,
    pub location: Location,
    pub options: ForecastOptions,
}

impl ForecastQuery {
    pub fn new(date: NaiveDate, location: Location, options: ForecastOptions) -> Self {
        Self { date, location, options }
    }
}

/// Document returned by the weather provider together with its HTTP status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub payload: Value,
    pub status_code: u16,
}

impl FetchResult {
    pub fn new(payload: Value, status_code: u16) -> Self {
        Self { payload, status_code }
    }

    pub fn empty(status_code: u16) -> Self {
        Self { payload: Value::Object(Default::default()), status_code }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status_code)
    }
}

/// Destination of one artifact: a filesystem path or an object key,
/// depending on the sink that receives it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteTarget(String);

impl WriteTarget {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `<root>/<location>/<date>.json`
    pub fn for_history(root: &str, location: &Location, date: NaiveDate) -> Self {
        Self::join(root, location, &format!("{}.json", date.format(DATE_FORMAT)))
    }

    /// `<root>/<location>/forecast-<date>.json`
    pub fn for_forecast(root: &str, location: &Location, date: NaiveDate) -> Self {
        Self::join(root, location, &format!("forecast-{}.json", date.format(DATE_FORMAT)))
    }

    fn join(root: &str, location: &Location, file_name: &str) -> Self {
        let trimmed = root.trim_end_matches('/');
        if !trimmed.is_empty() {
            Self(format!("{trimmed}/{location}/{file_name}"))
        } else if root.is_empty() {
            Self(format!("{location}/{file_name}"))
        } else {
            // Root was "/" (or "//"): stay absolute.
            Self(format!("/{location}/{file_name}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
