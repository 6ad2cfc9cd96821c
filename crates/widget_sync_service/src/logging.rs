use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines for the consumer CLI.
    Text,
    /// One JSON object per event, for CloudWatch.
    Json,
}

/// Installs the global subscriber. `RUST_LOG` overrides the `info` default.
///
/// A second call is a no-op, so tests and binaries can both call it.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().without_time().try_init(),
    };
}
