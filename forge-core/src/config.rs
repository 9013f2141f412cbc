//! Configuration types
//!
//! Loaded from TOML. Library code only needs [`PipelineConfig`], whose
//! `Default` carries the reference limits.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on capabilities one extraction may return.
pub const MAX_CAPABILITIES: usize = 6;

/// Characters of inline documentation sent to the provider.
pub const DEFAULT_INLINE_TEXT_BUDGET: usize = 50_000;

/// Persisted messages included as history in each turn.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Bound applied to every provider call.
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 60_000;

/// Model provider connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    /// Base URL of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Model used for chat turns
    pub model: String,
    /// Model used for documentation analysis; falls back to `model`
    #[serde(default)]
    pub analysis_model: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub requests_per_minute: u32,
}

impl ProviderSettings {
    pub fn analysis_model(&self) -> &str {
        self.analysis_model.as_deref().unwrap_or(&self.model)
    }
}

/// Limits of the extraction and dispatch pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    pub inline_text_budget: usize,
    pub max_capabilities: usize,
    pub history_window: usize,
    pub provider_timeout_ms: u64,
}

impl PipelineConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inline_text_budget == 0 {
            return Err(invalid(
                "pipeline.inline_text_budget",
                self.inline_text_budget,
                "must be greater than 0",
            ));
        }
        if self.max_capabilities == 0 || self.max_capabilities > MAX_CAPABILITIES {
            return Err(invalid(
                "pipeline.max_capabilities",
                self.max_capabilities,
                "must be between 1 and 6",
            ));
        }
        if self.history_window == 0 {
            return Err(invalid(
                "pipeline.history_window",
                self.history_window,
                "must be greater than 0",
            ));
        }
        if self.provider_timeout_ms == 0 {
            return Err(invalid(
                "pipeline.provider_timeout_ms",
                self.provider_timeout_ms,
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inline_text_budget: DEFAULT_INLINE_TEXT_BUDGET,
            max_capabilities: MAX_CAPABILITIES,
            history_window: DEFAULT_HISTORY_WINDOW,
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
        }
    }
}

/// Where the registry snapshot lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSettings {
    pub snapshot_path: PathBuf,
}

/// Subscriber settings for the binary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingSettings {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// `EnvFilter` directive used when neither FORGE_LOG nor RUST_LOG is set
    pub filter: Option<String>,
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgeConfig {
    pub provider: ProviderSettings,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub storage: StorageSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl ForgeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ForgeConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - provider base_url, model and api_key_env are non-empty
    /// - requests_per_minute > 0
    /// - pipeline limits (see [`PipelineConfig::validate`])
    /// - snapshot_path is non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "provider.base_url".to_string(),
            });
        }
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "provider.model".to_string(),
            });
        }
        if self.provider.api_key_env.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "provider.api_key_env".to_string(),
            });
        }
        if self.provider.requests_per_minute == 0 {
            return Err(invalid(
                "provider.requests_per_minute",
                self.provider.requests_per_minute,
                "must be greater than 0",
            ));
        }

        self.pipeline.validate()?;

        if self.storage.snapshot_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "storage.snapshot_path".to_string(),
            });
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[provider]
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
requests_per_minute = 60

[pipeline]
history_window = 12

[storage]
snapshot_path = "/tmp/forge/state.json"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = ForgeConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.provider.analysis_model(), "gpt-4o-mini");
        assert_eq!(config.pipeline.history_window, 12);
        assert_eq!(config.pipeline.inline_text_budget, DEFAULT_INLINE_TEXT_BUDGET);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let contents = format!("{}\n[extra]\nvalue = 1\n", SAMPLE);
        assert!(matches!(
            ForgeConfig::from_toml_str(&contents),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let contents = SAMPLE.replace("requests_per_minute = 60", "requests_per_minute = 0");
        assert!(matches!(
            ForgeConfig::from_toml_str(&contents),
            Err(ConfigError::InvalidValue { field, .. }) if field == "provider.requests_per_minute"
        ));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = ForgeConfig::from_path(&path).unwrap();
        assert_eq!(config.provider.requests_per_minute, 60);
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = ForgeConfig::from_path(Path::new("/nonexistent/forge.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_default_pipeline_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// For any max_capabilities above the hard cap, validate() SHALL fail.
        #[test]
        fn prop_pipeline_rejects_capability_cap_above_six(max in 7usize..1000) {
            let config = PipelineConfig { max_capabilities: max, ..PipelineConfig::default() };
            let result = config.validate();
            prop_assert!(
                matches!(result, Err(ConfigError::InvalidValue { ref field, .. }) if field == "pipeline.max_capabilities"),
                "Expected ConfigError::InvalidValue"
            );
        }

        /// For any positive limits within bounds, validate() SHALL succeed.
        #[test]
        fn prop_pipeline_accepts_valid_values(
            budget in 1usize..200_000,
            max in 1usize..=6,
            window in 1usize..100,
            timeout in 1u64..600_000,
        ) {
            let config = PipelineConfig {
                inline_text_budget: budget,
                max_capabilities: max,
                history_window: window,
                provider_timeout_ms: timeout,
            };
            prop_assert!(config.validate().is_ok());
        }
    }
}
