//! Core library for the weather pipeline.
//!
//! This crate defines:
//! - The durable location registry (SQLite)
//! - The weather provider abstraction and its HTTP client
//! - Pluggable output sinks and the factory that selects them
//! - The run orchestrator and its per-location report
//! - Configuration & credentials handling
//!
//! It is used by `weather-pipeline-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod sink;

pub use config::{Config, Settings};
pub use error::{Phase, PipelineError, SinkError, TransportError};
pub use model::{FetchResult, ForecastOptions, ForecastQuery, Location, WriteTarget};
pub use pipeline::{LocationOutcome, Pipeline, RunReport};
pub use provider::{RetryingProvider, WeatherApiClient, WeatherProvider};
pub use registry::LocationRegistry;
pub use sink::{Sink, SinkFactory, SinkKind, SinkParams};
