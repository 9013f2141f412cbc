//! Integration setup session
//!
//! Drives one service from a name to a finalized [`Integration`]:
//! `Name -> (Discovery | Manual) -> Capabilities -> Config -> Confirm`,
//! ending in `Finalized` once the record has been built.
//! Methods take `&mut self`, so one session never runs two operations of the
//! same kind at once.

use crate::auth::{AuthInferencer, AuthStatus, AuthTask};
use crate::extractor::CapabilityExtractor;
use crate::synthesizer::{dedup_endpoints, synthesize};
use forge_core::{
    AuthConfig, AuthOutcome, Capability, DocsHint, DocumentationSource, Integration,
    PipelineConfig, SetupError, ToolDeclaration,
};
use forge_llm::{with_timeout, IntegrationFinalized, ListenerChain, ModelProvider};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Wizard step of a setup session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    Name,
    Discovery,
    Manual,
    Capabilities,
    Config,
    Confirm,
    /// Terminal; the integration has been built.
    Finalized,
}

impl SetupStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Discovery => "discovery",
            Self::Manual => "manual",
            Self::Capabilities => "capabilities",
            Self::Config => "config",
            Self::Confirm => "confirm",
            Self::Finalized => "finalized",
        }
    }

    fn accepts_documentation(&self) -> bool {
        matches!(self, Self::Name | Self::Discovery | Self::Manual)
    }

    fn is_analyzed(&self) -> bool {
        matches!(self, Self::Capabilities | Self::Config | Self::Confirm)
    }
}

/// Result of a documentation search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Found(DocsHint),
    /// Nothing usable; the session moved to manual entry.
    Miss,
}

pub struct SetupSession {
    service_name: String,
    step: SetupStep,
    source: Option<DocumentationSource>,
    docs_hint: Option<DocsHint>,
    capabilities: Vec<Capability>,
    selected: HashSet<String>,
    auth: Option<AuthTask>,
    config_values: BTreeMap<String, String>,

    provider: Arc<dyn ModelProvider>,
    pipeline: PipelineConfig,
    listeners: ListenerChain,
}

impl SetupSession {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        pipeline: PipelineConfig,
        service_name: impl Into<String>,
    ) -> Result<Self, SetupError> {
        let service_name = service_name.into().trim().to_string();
        if service_name.is_empty() {
            return Err(SetupError::MissingServiceName);
        }
        Ok(Self {
            service_name,
            step: SetupStep::Name,
            source: None,
            docs_hint: None,
            capabilities: Vec::new(),
            selected: HashSet::new(),
            auth: None,
            config_values: BTreeMap::new(),
            provider,
            pipeline,
            listeners: ListenerChain::new(),
        })
    }

    pub fn with_listeners(mut self, listeners: ListenerChain) -> Self {
        self.listeners = listeners;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn step(&self) -> SetupStep {
        self.step
    }

    pub fn source(&self) -> Option<&DocumentationSource> {
        self.source.as_ref()
    }

    pub fn docs_hint(&self) -> Option<&DocsHint> {
        self.docs_hint.as_ref()
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn config_values(&self) -> &BTreeMap<String, String> {
        &self.config_values
    }

    fn expect_step(&self, ok: bool, expected: SetupStep) -> Result<(), SetupError> {
        if ok {
            Ok(())
        } else {
            Err(SetupError::WrongStep {
                expected: expected.as_str(),
                actual: self.step.as_str(),
            })
        }
    }

    // ------------------------------------------------------------------------
    // Documentation
    // ------------------------------------------------------------------------

    /// Ask the provider where the service's documentation lives.
    ///
    /// Provider failures count as a miss.
    pub async fn discover(&mut self) -> Result<DiscoveryOutcome, SetupError> {
        self.expect_step(self.step.accepts_documentation(), SetupStep::Name)?;

        let result = with_timeout(
            "documentation search",
            self.pipeline.provider_timeout(),
            self.provider.search_docs(&self.service_name),
        )
        .await;

        match result {
            Ok(Some(hint)) if !hint.url.trim().is_empty() => {
                self.source = Some(DocumentationSource::Url(hint.url.clone()));
                self.docs_hint = Some(hint.clone());
                self.step = SetupStep::Discovery;
                Ok(DiscoveryOutcome::Found(hint))
            }
            Ok(_) => {
                tracing::info!(service = %self.service_name, "No documentation found");
                self.step = SetupStep::Manual;
                Ok(DiscoveryOutcome::Miss)
            }
            Err(e) => {
                tracing::info!(
                    service = %self.service_name,
                    error = %e,
                    "Documentation search failed"
                );
                self.step = SetupStep::Manual;
                Ok(DiscoveryOutcome::Miss)
            }
        }
    }

    pub fn use_url(&mut self, url: impl Into<String>) -> Result<(), SetupError> {
        let url = url.into().trim().to_string();
        self.set_source(DocumentationSource::Url(url))
    }

    pub fn use_inline_text(&mut self, text: impl Into<String>) -> Result<(), SetupError> {
        self.set_source(DocumentationSource::InlineText(text.into()))
    }

    fn set_source(&mut self, source: DocumentationSource) -> Result<(), SetupError> {
        self.expect_step(self.step.accepts_documentation(), SetupStep::Manual)?;
        if source.is_empty() {
            return Err(SetupError::MissingDocumentation);
        }
        self.source = Some(source);
        self.docs_hint = None;
        self.step = SetupStep::Manual;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------------

    /// Extract capabilities and start auth inference in the background.
    ///
    /// On failure the session stays where it was and may be retried.
    pub async fn analyze(&mut self) -> Result<&[Capability], SetupError> {
        self.expect_step(
            matches!(self.step, SetupStep::Discovery | SetupStep::Manual),
            SetupStep::Manual,
        )?;
        let source = self.source.clone().ok_or(SetupError::MissingDocumentation)?;

        let extractor = CapabilityExtractor::new(self.provider.clone(), self.pipeline.clone())
            .with_listeners(self.listeners.clone());
        let capabilities = extractor.extract(&self.service_name, source.clone()).await?;

        self.selected = capabilities.iter().map(|c| c.id.clone()).collect();
        self.capabilities = capabilities;
        self.config_values.clear();

        let inferencer = AuthInferencer::new(self.provider.clone(), self.pipeline.clone())
            .with_listeners(self.listeners.clone());
        self.auth = Some(inferencer.spawn(self.service_name.clone(), source));

        self.step = SetupStep::Capabilities;
        Ok(&self.capabilities)
    }

    /// Flip selection of one capability; returns the new state.
    pub fn toggle_capability(&mut self, id: &str) -> Result<bool, SetupError> {
        self.expect_step(self.step.is_analyzed(), SetupStep::Capabilities)?;
        if !self.capabilities.iter().any(|c| c.id == id) {
            return Err(SetupError::UnknownCapability { id: id.to_string() });
        }
        if self.selected.remove(id) {
            Ok(false)
        } else {
            self.selected.insert(id.to_string());
            Ok(true)
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Selected capabilities in extraction order.
    pub fn selected_capabilities(&self) -> Vec<&Capability> {
        self.capabilities
            .iter()
            .filter(|c| self.selected.contains(&c.id))
            .collect()
    }

    /// Declarations the selected capabilities would expose.
    pub fn preview_tools(&self) -> Vec<ToolDeclaration> {
        synthesize(&self.service_name, self.selected_capabilities())
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    pub fn auth_status(&self) -> AuthStatus {
        self.auth
            .as_ref()
            .map_or(AuthStatus::NotStarted, AuthTask::status)
    }

    /// Wait for auth inference and seed an empty value for every field.
    pub async fn wait_for_auth(&mut self) -> Result<(AuthConfig, AuthOutcome), SetupError> {
        let task = self.auth.as_mut().ok_or(SetupError::WrongStep {
            expected: SetupStep::Capabilities.as_str(),
            actual: self.step.as_str(),
        })?;
        let (config, outcome) = task.wait().await;
        self.seed_config(&config);
        Ok((config, outcome))
    }

    /// Run inference again. Only allowed after a defaulted result.
    pub fn retry_auth(&mut self) -> Result<(), SetupError> {
        match self.auth_status() {
            AuthStatus::NotStarted => Err(SetupError::WrongStep {
                expected: SetupStep::Capabilities.as_str(),
                actual: self.step.as_str(),
            }),
            AuthStatus::Loading => Err(SetupError::AuthPending),
            AuthStatus::Ready { outcome, .. } if !outcome.is_defaulted() => {
                Err(SetupError::AuthRetryNotAllowed)
            }
            AuthStatus::Ready { .. } => {
                let source = self.source.clone().ok_or(SetupError::MissingDocumentation)?;
                let inferencer = AuthInferencer::new(self.provider.clone(), self.pipeline.clone())
                    .with_listeners(self.listeners.clone());
                self.auth = Some(inferencer.spawn(self.service_name.clone(), source));
                Ok(())
            }
        }
    }

    fn seed_config(&mut self, config: &AuthConfig) {
        for field in &config.fields {
            self.config_values.entry(field.key.clone()).or_default();
        }
    }

    /// Absorb a resolved auth result without waiting.
    fn resolved_auth(&mut self) -> Option<AuthConfig> {
        match self.auth_status() {
            AuthStatus::Ready { config, .. } => {
                self.seed_config(&config);
                Some(config)
            }
            _ => None,
        }
    }

    /// Resolved auth config with every required field filled in.
    fn checked_credentials(&mut self) -> Result<AuthConfig, SetupError> {
        let config = self.resolved_auth().ok_or(SetupError::AuthPending)?;
        let missing = config
            .fields
            .iter()
            .find(|f| {
                f.required
                    && self
                        .config_values
                        .get(&f.key)
                        .map_or(true, |v| v.trim().is_empty())
            })
            .map(|f| f.key.clone());
        match missing {
            Some(key) => Err(SetupError::MissingCredential { key }),
            None => Ok(config),
        }
    }

    // ------------------------------------------------------------------------
    // Config and finalize
    // ------------------------------------------------------------------------

    /// Fill one inferred credential field.
    pub fn set_config_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SetupError> {
        self.expect_step(self.step.is_analyzed(), SetupStep::Config)?;
        let key = key.into();
        let config = self.resolved_auth().ok_or(SetupError::AuthPending)?;
        if !config.fields.iter().any(|f| f.key == key) {
            return Err(SetupError::UnknownCredential { key });
        }
        self.config_values.insert(key, value.into());
        Ok(())
    }

    pub fn continue_to_config(&mut self) -> Result<(), SetupError> {
        self.expect_step(self.step == SetupStep::Capabilities, SetupStep::Capabilities)?;
        if self.selected.is_empty() {
            return Err(SetupError::NothingSelected);
        }
        self.resolved_auth();
        self.step = SetupStep::Config;
        Ok(())
    }

    pub fn continue_to_confirm(&mut self) -> Result<(), SetupError> {
        self.expect_step(self.step == SetupStep::Config, SetupStep::Config)?;
        self.checked_credentials()?;
        self.step = SetupStep::Confirm;
        Ok(())
    }

    /// Build the integration record from the current selection.
    ///
    /// Requires resolved auth with every required credential filled. A
    /// session finalizes at most once.
    pub async fn finalize(&mut self) -> Result<Integration, SetupError> {
        self.expect_step(self.step.is_analyzed(), SetupStep::Confirm)?;
        if self.selected.is_empty() {
            return Err(SetupError::NothingSelected);
        }
        let auth_config = self.checked_credentials()?;

        let endpoints = dedup_endpoints(self.selected_capabilities());
        let docs_url = self
            .source
            .as_ref()
            .and_then(DocumentationSource::url)
            .unwrap_or_default()
            .to_string();
        let description = self
            .docs_hint
            .as_ref()
            .map(|h| h.description.trim().to_string())
            .filter(|d| !d.is_empty());

        let integration = Integration::new(
            self.service_name.clone(),
            description,
            docs_url,
            endpoints,
            Some(auth_config),
            self.config_values.clone(),
        )?;

        self.auth = None;
        self.step = SetupStep::Finalized;
        tracing::info!(
            service = %self.service_name,
            integration_id = %integration.id,
            endpoints = integration.endpoints.len(),
            "Integration finalized"
        );
        self.listeners
            .emit_integration_finalized(IntegrationFinalized {
                integration: integration.clone(),
            })
            .await;
        Ok(integration)
    }
}

impl std::fmt::Debug for SetupSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupSession")
            .field("service_name", &self.service_name)
            .field("step", &self.step)
            .field("capabilities", &self.capabilities.len())
            .field("selected", &self.selected.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{AuthType, ExtractionError, LlmError};
    use forge_test_utils::{fixtures, ScriptedProvider};
    use serde_json::json;

    fn session(provider: &Arc<ScriptedProvider>) -> SetupSession {
        SetupSession::new(provider.clone(), PipelineConfig::default(), "Jira").unwrap()
    }

    #[test]
    fn test_blank_name_rejected() {
        let provider = Arc::new(ScriptedProvider::new());
        let result = SetupSession::new(provider, PipelineConfig::default(), "  ");
        assert!(matches!(result, Err(SetupError::MissingServiceName)));
    }

    #[tokio::test]
    async fn test_discovery_hit_moves_to_discovery() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_search(Ok(Some(fixtures::docs_hint())));
        let mut session = session(&provider);

        let outcome = session.discover().await.unwrap();

        assert_eq!(outcome, DiscoveryOutcome::Found(fixtures::docs_hint()));
        assert_eq!(session.step(), SetupStep::Discovery);
        let hint = fixtures::docs_hint();
        assert_eq!(session.source().and_then(|s| s.url()), Some(hint.url.as_str()));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_a_miss() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_search(Err(LlmError::ProviderNotConfigured));
        let mut session = session(&provider);

        assert_eq!(session.discover().await.unwrap(), DiscoveryOutcome::Miss);
        assert_eq!(session.step(), SetupStep::Manual);
    }

    #[tokio::test]
    async fn test_analyze_without_source_rejected() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_search(Ok(None));
        let mut session = session(&provider);
        session.discover().await.unwrap();

        let result = session.analyze().await.map(|c| c.len());
        assert!(matches!(result, Err(SetupError::MissingDocumentation)));
        assert_eq!(provider.capability_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_analysis_stays_on_step() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_capabilities(Ok(json!([])));
        provider.push_capabilities(Ok(fixtures::capabilities_json()));
        provider.push_auth(Ok(fixtures::auth_json()));
        let mut session = session(&provider);
        session.use_inline_text("GET /rest/api/3/search").unwrap();

        let first = session.analyze().await.map(|c| c.len());
        assert_eq!(first, Err(SetupError::Extraction(ExtractionError::Empty)));
        assert_eq!(session.step(), SetupStep::Manual);
        assert_eq!(session.auth_status(), AuthStatus::NotStarted);

        let second = session.analyze().await.map(|c| c.len());
        assert_eq!(second, Ok(2));
        assert_eq!(session.step(), SetupStep::Capabilities);
    }

    #[tokio::test]
    async fn test_toggle_and_nothing_selected() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_capabilities(Ok(fixtures::capabilities_json()));
        provider.push_auth(Ok(fixtures::auth_json()));
        let mut session = session(&provider);
        session.use_url("https://docs.example.com").unwrap();
        session.analyze().await.unwrap();

        assert_eq!(session.selected_capabilities().len(), 2);
        assert_eq!(session.toggle_capability("browse_issues"), Ok(false));
        assert_eq!(session.toggle_capability("manage_issues"), Ok(false));
        assert!(matches!(
            session.toggle_capability("missing"),
            Err(SetupError::UnknownCapability { .. })
        ));
        assert_eq!(session.continue_to_config(), Err(SetupError::NothingSelected));
        assert!(matches!(session.finalize().await, Err(SetupError::NothingSelected)));
    }

    #[tokio::test]
    async fn test_retry_only_after_default() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_capabilities(Ok(fixtures::capabilities_json()));
        provider.push_auth(Ok(json!("garbage")));
        provider.push_auth(Ok(fixtures::auth_json()));
        let mut session = session(&provider);
        session.use_url("https://docs.example.com").unwrap();
        session.analyze().await.unwrap();

        let (config, outcome) = session.wait_for_auth().await.unwrap();
        assert!(config.is_empty_default());
        assert_eq!(outcome, AuthOutcome::Defaulted);

        session.retry_auth().unwrap();
        let (config, outcome) = session.wait_for_auth().await.unwrap();
        assert_eq!(config.auth_type, AuthType::ApiKey);
        assert_eq!(outcome, AuthOutcome::Inferred);
        assert_eq!(session.retry_auth(), Err(SetupError::AuthRetryNotAllowed));
        assert_eq!(provider.auth_calls(), 2);
    }

    #[tokio::test]
    async fn test_finalize_dedups_and_keeps_config() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_search(Ok(Some(fixtures::docs_hint())));
        provider.push_capabilities(Ok(fixtures::capabilities_json()));
        provider.push_auth(Ok(fixtures::auth_json()));
        let mut session = session(&provider);

        session.discover().await.unwrap();
        session.analyze().await.unwrap();
        session.wait_for_auth().await.unwrap();
        assert_eq!(session.config_values().get("api_token").map(String::as_str), Some(""));

        session.continue_to_config().unwrap();
        session.set_config_value("api_token", "secret").unwrap();
        assert_eq!(
            session.continue_to_confirm(),
            Err(SetupError::MissingCredential {
                key: "domain".to_string()
            })
        );
        session.set_config_value("domain", "https://acme.atlassian.net").unwrap();
        session.continue_to_confirm().unwrap();
        let integration = session.finalize().await.unwrap();

        let ids: Vec<_> = integration.endpoints.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["list_issues", "get_issue", "create_issue"]);
        assert_eq!(integration.config["api_token"], "secret");
        assert_eq!(integration.config["domain"], "https://acme.atlassian.net");
        assert_eq!(integration.docs_url, fixtures::docs_hint().url);
        assert!(integration.auth_config.is_some());
    }

    #[tokio::test]
    async fn test_unknown_config_key_rejected() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_capabilities(Ok(fixtures::capabilities_json()));
        provider.push_auth(Ok(fixtures::auth_json()));
        let mut session = session(&provider);
        session.use_url("https://docs.example.com").unwrap();
        session.analyze().await.unwrap();
        session.wait_for_auth().await.unwrap();

        assert_eq!(
            session.set_config_value("base_url", "https://acme.atlassian.net"),
            Err(SetupError::UnknownCredential {
                key: "base_url".to_string()
            })
        );
        assert!(!session.config_values().contains_key("base_url"));
    }

    #[tokio::test]
    async fn test_second_finalize_rejected() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_capabilities(Ok(fixtures::capabilities_json()));
        provider.push_auth(Ok(json!({"type": "custom", "fields": []})));
        let mut session = session(&provider);
        session.use_url("https://docs.example.com").unwrap();
        session.analyze().await.unwrap();
        session.wait_for_auth().await.unwrap();

        session.finalize().await.unwrap();
        assert_eq!(session.step(), SetupStep::Finalized);
        assert!(matches!(
            session.finalize().await,
            Err(SetupError::WrongStep {
                actual: "finalized",
                ..
            })
        ));
        assert!(session.toggle_capability("browse_issues").is_err());
    }
}
