use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber` using `WEATHER_PIPELINE_LOG` first, then
/// `RUST_LOG`, then `info`. Logs go to stderr so stdout stays the report.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("WEATHER_PIPELINE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
