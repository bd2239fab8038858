use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{
    error::PipelineError,
    pipeline::DEFAULT_CONCURRENCY,
    sink::{SinkKind, SinkParams},
};

pub const ENV_API_KEY: &str = "WEATHER_API_KEY";
pub const ENV_API_BASE_URL: &str = "WEATHER_API_BASE_URL";
pub const ENV_STORE_PATH: &str = "WEATHER_STORE_PATH";
pub const ENV_OUTPUT_ROOT: &str = "WEATHER_OUTPUT_ROOT";
pub const ENV_SINK: &str = "WEATHER_SINK";

const DEFAULT_OUTPUT_ROOT: &str = "./output";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// api_base_url = "https://api.weatherapi.com/v1/"
/// store_path = "/var/lib/weather/locations.db"
/// sink = "remote-blob"
///
/// [sink_params]
/// account = "..."
/// container = "history"
/// access_key = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub store_path: Option<PathBuf>,
    pub output_root: Option<String>,
    /// Sink type tag, e.g. "local" or "remote-blob".
    pub sink: Option<String>,
    pub sink_params: HashMap<String, String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Validated configuration: everything the pipeline needs to start.
#[derive(Clone)]
pub struct Settings {
    pub api_key: String,
    pub api_base_url: String,
    pub store_path: PathBuf,
    pub output_root: String,
    pub sink: SinkKind,
    pub sink_params: SinkParams,
    pub concurrency: usize,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_base_url", &self.api_base_url)
            .field("store_path", &self.store_path)
            .field("output_root", &self.output_root)
            .field("sink", &self.sink)
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Default location of the registry database when none is configured.
    pub fn default_store_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("locations.db"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-pipeline", "weather-pipeline")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Override file values with any set environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Same as [`Config::apply_env`], reading variables through `lookup`.
    /// Empty values are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = get(ENV_API_BASE_URL) {
            self.api_base_url = Some(v);
        }
        if let Some(v) = get(ENV_STORE_PATH) {
            self.store_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_OUTPUT_ROOT) {
            self.output_root = Some(v);
        }
        if let Some(v) = get(ENV_SINK) {
            self.sink = Some(v);
        }
    }

    /// Validate into [`Settings`]. A missing required value fails with
    /// [`PipelineError::Configuration`] naming the setting.
    ///
    /// `default_store_path` is used when no store path is configured.
    pub fn settings(&self, default_store_path: Option<PathBuf>) -> Result<Settings, PipelineError> {
        let api_key = required(&self.api_key, "api_key", ENV_API_KEY)?;
        let api_base_url = required(&self.api_base_url, "api_base_url", ENV_API_BASE_URL)?;
        let store_path = self.store_path.clone().or(default_store_path).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "no registry store configured; set 'store_path' or {ENV_STORE_PATH}"
            ))
        })?;

        let sink = SinkKind::try_from(self.sink.as_deref().unwrap_or(SinkKind::Local.as_str()))?;

        Ok(Settings {
            api_key,
            api_base_url,
            store_path,
            output_root: self
                .output_root
                .clone()
                .unwrap_or_else(|| DEFAULT_OUTPUT_ROOT.to_string()),
            sink,
            sink_params: self.sink_params.clone(),
            concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            max_retries: self.max_retries.unwrap_or(0),
        })
    }

    /// Convenience helper used by the interactive `configure` command.
    pub fn set_credentials(&mut self, api_key: String, api_base_url: String) {
        self.api_key = Some(api_key);
        self.api_base_url = Some(api_base_url);
    }
}

fn required(value: &Option<String>, name: &str, env: &str) -> Result<String, PipelineError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::Configuration(format!(
                "'{name}' is not set.\n\
                 Hint: run `weather-pipeline configure` or set {env}."
            ))
        })
}
