//! Tracing subscriber setup.

use crate::error::CliError;
use forge_core::LoggingSettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "forge=info";

/// FORGE_LOG, then RUST_LOG, then the configured filter, then [`DEFAULT_FILTER`].
fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_env("FORGE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| {
            EnvFilter::new(settings.filter.as_deref().unwrap_or(DEFAULT_FILTER))
        })
}

/// Install the global subscriber. Logs go to stderr so they don't mix with
/// the conversation on stdout.
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), CliError> {
    let registry = tracing_subscriber::registry().with(env_filter(settings));
    let result = if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| CliError::Telemetry(e.to_string()))
}
