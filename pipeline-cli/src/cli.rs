use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;
use weather_pipeline_core::{
    Config, Location, LocationRegistry, Pipeline, Settings, SinkFactory, model::parse_date,
    provider::provider_from_settings,
};

const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1/";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weather-pipeline",
    version,
    about = "Fetch and store weather history for tracked locations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the weather API key and base URL in the config file.
    Configure,

    /// Start tracking a location.
    Add {
        /// Postcode, city name or "lat,lon".
        location: String,
    },

    /// Stop tracking a location. Untracked locations are ignored.
    Remove { location: String },

    /// List tracked locations.
    List,

    /// Fetch history for every tracked location and write it to the sink.
    Run {
        /// Date to fetch, YYYY-MM-DD; defaults to today.
        #[arg(long)]
        date: Option<String>,

        /// Sink type overriding the configured one, e.g. "local".
        #[arg(long)]
        sink: Option<String>,
    },

    /// Fetch a forecast for one location and write it to the sink.
    Forecast {
        location: String,

        /// Number of forecast days, at least 1.
        #[arg(long, default_value_t = 1)]
        days: u32,

        /// Include weather alerts: "yes" or "no".
        #[arg(long, default_value = "no")]
        alerts: String,

        /// Include air quality data: "yes" or "no".
        #[arg(long, default_value = "no")]
        aqi: String,

        /// Sink type overriding the configured one.
        #[arg(long)]
        sink: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure()?,
            Command::Add { location } => {
                let (_, pipeline) = open()?;
                pipeline.add_location(&Location::new(location)?)?;
            }
            Command::Remove { location } => {
                let (_, pipeline) = open()?;
                pipeline.remove_location(&Location::new(location)?)?;
            }
            Command::List => {
                let (_, pipeline) = open()?;
                for location in pipeline.list_locations()? {
                    println!("{location}");
                }
            }
            Command::Run { date, sink } => {
                let date = resolve_date(date.as_deref())?;
                let (settings, pipeline) = open()?;
                let sink_type = sink.unwrap_or_else(|| settings.sink.to_string());
                let sink = SinkFactory::get(&sink_type, &settings.sink_params)?;

                let report = pipeline.run(date, sink.as_ref(), &settings.output_root).await?;
                for outcome in &report.outcomes {
                    println!("{outcome}");
                }
                println!(
                    "{} succeeded, {} failed ({date})",
                    report.succeeded(),
                    report.failed()
                );

                report.into_result()?;
            }
            Command::Forecast { location, days, alerts, aqi, sink } => {
                let location = Location::new(location)?;
                let (settings, pipeline) = open()?;
                let sink_type = sink.unwrap_or_else(|| settings.sink.to_string());
                let sink = SinkFactory::get(&sink_type, &settings.sink_params)?;

                let target = pipeline
                    .fetch_and_write_forecast(
                        &location,
                        today(),
                        days,
                        &alerts,
                        &aqi,
                        sink.as_ref(),
                        &settings.output_root,
                    )
                    .await?;
                println!("{target}");
            }
        }

        Ok(())
    }
}

fn configure() -> anyhow::Result<()> {
    let mut cfg = Config::load()?;

    let api_key = inquire::Password::new("Weather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    let base_url = inquire::Text::new("Weather API base URL:")
        .with_default(cfg.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))
        .prompt()
        .context("Failed to read API base URL")?;

    cfg.set_credentials(api_key, base_url);
    cfg.save()?;

    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Config file, then environment overrides, then validation. Fails before
/// anything touches the registry or the network.
fn load_settings() -> anyhow::Result<Settings> {
    let mut cfg = Config::load()?;
    cfg.apply_env();
    let settings = cfg.settings(Config::default_store_path().ok())?;
    info!(?settings, "configuration loaded");
    Ok(settings)
}

/// Settings plus the one pipeline this process uses.
fn open() -> anyhow::Result<(Settings, Pipeline)> {
    let settings = load_settings()?;
    let pipeline = build_pipeline(&settings)?;
    Ok((settings, pipeline))
}

fn build_pipeline(settings: &Settings) -> anyhow::Result<Pipeline> {
    let registry = LocationRegistry::open(&settings.store_path).with_context(|| {
        format!("Failed to open location registry: {}", settings.store_path.display())
    })?;
    let provider = provider_from_settings(settings)?;

    Ok(Pipeline::new(registry, provider).with_concurrency(settings.concurrency))
}

fn resolve_date(date: Option<&str>) -> anyhow::Result<NaiveDate> {
    match date {
        Some(d) => Ok(parse_date(d)?),
        None => Ok(today()),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
