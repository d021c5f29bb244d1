//! Logging for Switchboard
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a `fmt`
//! layer writing either human-readable text or JSON lines.

use switchboard_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Held by `main` for the lifetime of the process
#[must_use = "dropping the guard ends the logging scope"]
#[derive(Debug)]
pub struct TelemetryGuard {
    format: LogFormat,
}

impl TelemetryGuard {
    /// Format the installed subscriber writes
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

/// Filter directive in effect: config, then `RUST_LOG`, then `default_filter`
pub fn filter_directive(config: Option<&TelemetryConfig>, default_filter: &str) -> String {
    config
        .and_then(|c| c.filter.clone())
        .filter(|f| !f.trim().is_empty())
        .or_else(|| std::env::var(EnvFilter::DEFAULT_ENV).ok().filter(|f| !f.trim().is_empty()))
        .unwrap_or_else(|| default_filter.to_owned())
}

/// Initialize logging from configuration
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or a global
/// subscriber is already installed
pub fn init(config: Option<&TelemetryConfig>, default_filter: &str) -> anyhow::Result<TelemetryGuard> {
    let directive = filter_directive(config, default_filter);
    let filter = EnvFilter::try_new(&directive).map_err(|e| anyhow::anyhow!("invalid log filter `{directive}`: {e}"))?;
    let format = config.map(|c| c.format).unwrap_or_default();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt_layer).try_init(),
        LogFormat::Json => registry.with(fmt_layer.json().flatten_event(true)).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(TelemetryGuard { format })
}
