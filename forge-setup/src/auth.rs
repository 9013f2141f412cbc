//! Auth inference
//!
//! Runs beside capability extraction and always resolves: anything short of
//! a well-formed config yields [`AuthConfig::empty_default`] with
//! [`AuthOutcome::Defaulted`].

use forge_core::{
    AnalysisKind, AnalysisRequest, AuthConfig, AuthField, AuthFieldType, AuthOutcome,
    AuthType, DocumentationSource, PipelineConfig,
};
use forge_llm::{with_timeout, AuthReady, ListenerChain, ModelProvider};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Observable state of a background inference.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    /// No inference has been started.
    NotStarted,
    Loading,
    Ready {
        config: AuthConfig,
        outcome: AuthOutcome,
    },
}

impl AuthStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

// ============================================================================
// SHAPE PARSING
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawAuthConfig {
    #[serde(rename = "type")]
    auth_type: String,
    #[serde(default)]
    fields: Vec<RawAuthField>,
}

#[derive(Debug, Deserialize)]
struct RawAuthField {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default, rename = "type")]
    field_type: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    placeholder: Option<String>,
}

fn parse_auth_type(raw: &str) -> Option<AuthType> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "apikey" | "api_key" | "api key" => Some(AuthType::ApiKey),
        "oauth2" | "oauth" => Some(AuthType::OAuth2),
        "basic" => Some(AuthType::Basic),
        "custom" => Some(AuthType::Custom),
        _ => None,
    }
}

fn parse_field_type(raw: Option<&str>) -> AuthFieldType {
    match raw.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
        Some("password") => AuthFieldType::Password,
        Some("url") => AuthFieldType::Url,
        _ => AuthFieldType::Text,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse analysis output into an [`AuthConfig`].
///
/// Returns `None` when the shape is unusable. Fields without a key are
/// dropped, a missing label falls back to the key, and repeated keys keep
/// their first occurrence.
pub fn parse_auth_config(value: Value) -> Option<AuthConfig> {
    let raw: RawAuthConfig = serde_json::from_value(value).ok()?;
    let auth_type = parse_auth_type(&raw.auth_type)?;

    let mut seen = HashSet::new();
    let fields = raw
        .fields
        .into_iter()
        .filter_map(|field| {
            let key = non_empty(field.key)?;
            if !seen.insert(key.clone()) {
                return None;
            }
            Some(AuthField {
                label: non_empty(field.label).unwrap_or_else(|| key.clone()),
                field_type: parse_field_type(field.field_type.as_deref()),
                required: field.required,
                description: non_empty(field.description),
                placeholder: non_empty(field.placeholder),
                key,
            })
        })
        .collect();

    Some(AuthConfig { auth_type, fields })
}

// ============================================================================
// INFERENCER
// ============================================================================

/// Infers the authentication scheme of a service.
#[derive(Clone)]
pub struct AuthInferencer {
    provider: Arc<dyn ModelProvider>,
    config: PipelineConfig,
    listeners: ListenerChain,
}

impl AuthInferencer {
    pub fn new(provider: Arc<dyn ModelProvider>, config: PipelineConfig) -> Self {
        Self {
            provider,
            config,
            listeners: ListenerChain::new(),
        }
    }

    pub fn with_listeners(mut self, listeners: ListenerChain) -> Self {
        self.listeners = listeners;
        self
    }

    /// Run one inference to completion. Never fails.
    pub async fn infer(
        &self,
        service_name: &str,
        source: DocumentationSource,
    ) -> (AuthConfig, AuthOutcome) {
        let request = AnalysisRequest {
            service_name: service_name.to_string(),
            source: source.truncated(self.config.inline_text_budget),
        };

        let result = with_timeout(
            "auth analysis",
            self.config.provider_timeout(),
            self.provider.analyze(AnalysisKind::Auth, &request),
        )
        .await;

        let (config, outcome) = match result {
            Ok(value) => match parse_auth_config(value) {
                Some(config) => (config, AuthOutcome::Inferred),
                None => {
                    tracing::warn!(service = service_name, "Auth output unusable, using default");
                    (AuthConfig::empty_default(), AuthOutcome::Defaulted)
                }
            },
            Err(e) => {
                tracing::warn!(
                    service = service_name,
                    error = %e,
                    "Auth inference failed, using default"
                );
                (AuthConfig::empty_default(), AuthOutcome::Defaulted)
            }
        };

        self.listeners
            .emit_auth_ready(AuthReady {
                service_name: service_name.to_string(),
                auth_config: config.clone(),
                outcome,
            })
            .await;

        (config, outcome)
    }

    /// Start an inference on the runtime and return a handle to observe it.
    pub fn spawn(&self, service_name: impl Into<String>, source: DocumentationSource) -> AuthTask {
        let (tx, rx) = watch::channel(AuthStatus::Loading);
        let inferencer = self.clone();
        let service_name = service_name.into();

        let handle = tokio::spawn(async move {
            let (config, outcome) = inferencer.infer(&service_name, source).await;
            // Receiver gone means the session was dropped.
            let _ = tx.send(AuthStatus::Ready { config, outcome });
        });

        AuthTask { rx, handle }
    }
}

impl std::fmt::Debug for AuthInferencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInferencer")
            .field("provider", &self.provider.provider_id())
            .finish()
    }
}

/// Handle to a spawned inference. Dropping it cancels the task.
#[derive(Debug)]
pub struct AuthTask {
    rx: watch::Receiver<AuthStatus>,
    handle: JoinHandle<()>,
}

impl AuthTask {
    /// Current status without waiting.
    pub fn status(&self) -> AuthStatus {
        self.rx.borrow().clone()
    }

    /// Wait for the inference to resolve.
    pub async fn wait(&mut self) -> (AuthConfig, AuthOutcome) {
        let resolved = match self.rx.wait_for(AuthStatus::is_ready).await {
            Ok(status) => status.clone(),
            Err(_) => AuthStatus::NotStarted,
        };
        match resolved {
            AuthStatus::Ready { config, outcome } => (config, outcome),
            // Task ended without reporting; treat like any other failure.
            _ => (AuthConfig::empty_default(), AuthOutcome::Defaulted),
        }
    }
}

impl Drop for AuthTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::LlmError;
    use forge_test_utils::{fixtures, ScriptedProvider};
    use serde_json::json;

    fn source() -> DocumentationSource {
        DocumentationSource::Url("https://docs.example.com".to_string())
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_auth_config(fixtures::auth_json()).unwrap();
        assert_eq!(config.auth_type, AuthType::ApiKey);
        assert_eq!(config.fields.len(), 2);
        assert_eq!(config.fields[0].field_type, AuthFieldType::Password);
        assert_eq!(config.fields[1].description, None);
    }

    #[test]
    fn test_duplicate_field_keys_keep_first() {
        let config = parse_auth_config(json!({
            "type": "basic",
            "fields": [
                {"key": "user", "label": "Username", "type": "text", "required": true},
                {"key": "user", "label": "Other", "type": "password", "required": false},
                {"label": "No key", "type": "text", "required": true}
            ]
        }))
        .unwrap();
        assert_eq!(config.fields.len(), 1);
        assert_eq!(config.fields[0].label, "Username");
    }

    #[test]
    fn test_invalid_shapes_rejected() {
        assert!(parse_auth_config(json!(null)).is_none());
        assert!(parse_auth_config(json!({"fields": []})).is_none());
        assert!(parse_auth_config(json!({"type": "kerberos", "fields": []})).is_none());
        assert!(parse_auth_config(json!({"type": "custom", "fields": "none"})).is_none());
    }

    #[tokio::test]
    async fn test_provider_error_defaults() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_auth(Err(LlmError::RequestFailed {
            provider: "scripted".to_string(),
            status: 500,
            message: "boom".to_string(),
        }));
        let inferencer = AuthInferencer::new(provider, PipelineConfig::default());

        let (config, outcome) = inferencer.infer("Jira", source()).await;
        assert!(config.is_empty_default());
        assert_eq!(outcome, AuthOutcome::Defaulted);
    }

    #[tokio::test]
    async fn test_spawned_task_reports_over_channel() {
        let provider = Arc::new(ScriptedProvider::new().with_auth_gate());
        provider.push_auth(Ok(fixtures::auth_json()));
        let inferencer = AuthInferencer::new(provider.clone(), PipelineConfig::default());

        let mut task = inferencer.spawn("Jira", source());
        provider.wait_for_auth_calls(1).await;
        assert_eq!(task.status(), AuthStatus::Loading);

        provider.release_auth();
        let (config, outcome) = task.wait().await;
        assert_eq!(outcome, AuthOutcome::Inferred);
        assert_eq!(config.auth_type, AuthType::ApiKey);
        assert!(task.status().is_ready());
    }
}
