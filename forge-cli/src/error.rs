//! Error types for the CLI.

use forge_core::{ConfigError, ForgeError, SetupError, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Forge(#[from] ForgeError),
    #[error("API key environment variable {var} is not set")]
    MissingApiKey { var: String },
    #[error("Failed to initialize logging: {0}")]
    Telemetry(String),
    #[error("{0}")]
    Usage(String),
}
