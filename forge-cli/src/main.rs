//! FORGE CLI entry point.

use clap::Parser;
use forge_cli::app::App;
use forge_cli::error::CliError;
use forge_cli::telemetry::init_tracing;
use forge_core::{ConfigError, ForgeConfig};
use forge_llm::providers::OpenAIProvider;
use forge_registry::Registry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "forge", version, about = "Connect services to a chat agent as tools")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    let path = args.config.ok_or(ConfigError::MissingConfigPath)?;
    let config = ForgeConfig::from_path(&path)?;
    init_tracing(&config.logging)?;

    let api_key_env = &config.provider.api_key_env;
    let api_key = std::env::var(api_key_env).map_err(|_| CliError::MissingApiKey {
        var: api_key_env.clone(),
    })?;
    let provider = Arc::new(OpenAIProvider::from_settings(&config.provider, api_key));

    let registry = Registry::load(&config.storage.snapshot_path)?;
    tracing::info!(
        config = %path.display(),
        integrations = registry.integrations().len(),
        projects = registry.projects().len(),
        "FORGE started"
    );

    App::new(config, provider, registry).run().await
}
