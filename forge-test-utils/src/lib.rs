//! FORGE Test Utilities
//!
//! Shared test infrastructure for the FORGE workspace:
//! - Scripted model provider for deterministic pipeline tests
//! - Proptest generators for entity types
//! - Test fixtures for common scenarios
//! - Assertions for pipeline invariants

// Re-export core types for convenience
pub use forge_core::{
    AnalysisKind, AnalysisRequest, AuthConfig, AuthField, AuthFieldType, AuthType, Capability,
    ChatTurn, ConverseReply, ConverseRequest, DocsHint, DocumentationSource, Endpoint,
    HttpMethod, Integration, LlmError, Message, MessageRole, ParamType, ParameterMap,
    ParameterSpec, PipelineConfig, Project, ProjectIcon, ToolCallRequest, ToolDeclaration,
};
pub use forge_llm::ModelProvider;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

// ============================================================================
// SCRIPTED PROVIDER
// ============================================================================

type Queue<T> = Mutex<VecDeque<Result<T, LlmError>>>;

/// Model provider that replays queued responses.
///
/// Each call kind has its own queue; an exhausted queue answers
/// `LlmError::ProviderNotConfigured`. Gates hold a call in flight until the
/// test releases it, after the call has been counted and recorded.
#[derive(Default)]
pub struct ScriptedProvider {
    search: Queue<Option<DocsHint>>,
    capabilities: Queue<Value>,
    auth: Queue<Value>,
    converse: Queue<ConverseReply>,

    search_calls: AtomicUsize,
    capability_calls: AtomicUsize,
    auth_calls: AtomicUsize,
    converse_calls: AtomicUsize,

    analysis_requests: Mutex<Vec<(AnalysisKind, AnalysisRequest)>>,
    converse_requests: Mutex<Vec<ConverseRequest>>,

    auth_gate: Option<Arc<Semaphore>>,
    converse_gate: Option<Arc<Semaphore>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every auth analysis until [`release_auth`](Self::release_auth).
    pub fn with_auth_gate(mut self) -> Self {
        self.auth_gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Hold every converse call until [`release_converse`](Self::release_converse).
    pub fn with_converse_gate(mut self) -> Self {
        self.converse_gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn push_search(&self, result: Result<Option<DocsHint>, LlmError>) -> &Self {
        lock(&self.search).push_back(result);
        self
    }

    pub fn push_capabilities(&self, result: Result<Value, LlmError>) -> &Self {
        lock(&self.capabilities).push_back(result);
        self
    }

    pub fn push_auth(&self, result: Result<Value, LlmError>) -> &Self {
        lock(&self.auth).push_back(result);
        self
    }

    pub fn push_converse(&self, result: Result<ConverseReply, LlmError>) -> &Self {
        lock(&self.converse).push_back(result);
        self
    }

    pub fn release_auth(&self) {
        if let Some(gate) = &self.auth_gate {
            gate.add_permits(1);
        }
    }

    pub fn release_converse(&self) {
        if let Some(gate) = &self.converse_gate {
            gate.add_permits(1);
        }
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn capability_calls(&self) -> usize {
        self.capability_calls.load(Ordering::SeqCst)
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn converse_calls(&self) -> usize {
        self.converse_calls.load(Ordering::SeqCst)
    }

    /// Every analysis request received so far, in order.
    pub fn analysis_requests(&self) -> Vec<(AnalysisKind, AnalysisRequest)> {
        self.analysis_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Every converse request received so far, in order.
    pub fn converse_requests(&self) -> Vec<ConverseRequest> {
        self.converse_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Yield until at least `n` converse calls have been made.
    pub async fn wait_for_converse_calls(&self, n: usize) {
        while self.converse_calls() < n {
            tokio::task::yield_now().await;
        }
    }

    /// Yield until at least `n` auth analyses have been made.
    pub async fn wait_for_auth_calls(&self, n: usize) {
        while self.auth_calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

fn lock<T>(queue: &Queue<T>) -> std::sync::MutexGuard<'_, VecDeque<Result<T, LlmError>>> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn next<T>(queue: &Queue<T>) -> Result<T, LlmError> {
    lock(queue)
        .pop_front()
        .unwrap_or(Err(LlmError::ProviderNotConfigured))
}

async fn pass(gate: &Option<Arc<Semaphore>>) {
    if let Some(gate) = gate {
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_id(&self) -> &str {
        "scripted"
    }

    async fn search_docs(&self, _service_name: &str) -> Result<Option<DocsHint>, LlmError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.search)
    }

    async fn analyze(
        &self,
        kind: AnalysisKind,
        request: &AnalysisRequest,
    ) -> Result<Value, LlmError> {
        if let Ok(mut requests) = self.analysis_requests.lock() {
            requests.push((kind, request.clone()));
        }
        match kind {
            AnalysisKind::Capabilities => {
                self.capability_calls.fetch_add(1, Ordering::SeqCst);
                next(&self.capabilities)
            }
            AnalysisKind::Auth => {
                self.auth_calls.fetch_add(1, Ordering::SeqCst);
                pass(&self.auth_gate).await;
                next(&self.auth)
            }
        }
    }

    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseReply, LlmError> {
        if let Ok(mut requests) = self.converse_requests.lock() {
            requests.push(request.clone());
        }
        self.converse_calls.fetch_add(1, Ordering::SeqCst);
        pass(&self.converse_gate).await;
        next(&self.converse)
    }
}

impl std::fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("search_calls", &self.search_calls())
            .field("capability_calls", &self.capability_calls())
            .field("auth_calls", &self.auth_calls())
            .field("converse_calls", &self.converse_calls())
            .finish()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating FORGE entity types.

    use super::*;
    use proptest::prelude::*;

    /// Generate an HttpMethod variant.
    pub fn arb_http_method() -> impl Strategy<Value = HttpMethod> {
        prop_oneof![
            Just(HttpMethod::Get),
            Just(HttpMethod::Post),
            Just(HttpMethod::Put),
            Just(HttpMethod::Delete),
            Just(HttpMethod::Patch),
        ]
    }

    /// Generate a canonical ParamType variant.
    pub fn arb_param_type() -> impl Strategy<Value = ParamType> {
        prop_oneof![
            Just(ParamType::String),
            Just(ParamType::Number),
            Just(ParamType::Boolean),
            Just(ParamType::Array),
            Just(ParamType::Object),
        ]
    }

    /// Generate a raw parameter type token as a provider might emit it.
    pub fn arb_raw_param_type() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("string".to_string()),
            Just("integer".to_string()),
            Just("Number".to_string()),
            Just("BOOLEAN".to_string()),
            Just("array".to_string()),
            Just("object".to_string()),
            "[a-z]{3,10}",
        ]
    }

    /// Generate a ProjectIcon variant.
    pub fn arb_project_icon() -> impl Strategy<Value = ProjectIcon> {
        prop::sample::select(ProjectIcon::ALL.to_vec())
    }

    /// Endpoint ids drawn from a small pool so collisions are common.
    pub fn arb_endpoint_id() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("list_issues".to_string()),
            Just("create_issue".to_string()),
            Just("get-issue".to_string()),
            Just("get.issue".to_string()),
            Just("search".to_string()),
            "[a-z][a-z_\\-.]{0,20}",
        ]
    }

    /// Generate an Endpoint with up to three parameters.
    pub fn arb_endpoint() -> impl Strategy<Value = Endpoint> {
        (
            arb_endpoint_id(),
            arb_http_method(),
            "/[a-z]{1,8}(/[a-z]{1,8}){0,2}",
            "[A-Za-z ]{0,30}",
            prop::collection::btree_map("[a-z]{1,8}", arb_param_type(), 0..3),
        )
            .prop_map(|(id, method, path, description, params)| {
                let parameters: ParameterMap = params
                    .into_iter()
                    .map(|(name, param_type)| {
                        (
                            name,
                            ParameterSpec {
                                param_type,
                                description: String::new(),
                            },
                        )
                    })
                    .collect();
                Endpoint {
                    id,
                    method,
                    path,
                    description,
                    parameters: if parameters.is_empty() {
                        None
                    } else {
                        Some(parameters)
                    },
                }
            })
    }

    /// Generate a Capability with 1-4 endpoints.
    pub fn arb_capability() -> impl Strategy<Value = Capability> {
        (
            "[a-z]{3,10}",
            "[A-Z][a-z]{2,10}",
            prop::collection::vec(arb_endpoint(), 1..5),
        )
            .prop_map(|(id, name, endpoints)| Capability {
                id,
                description: format!("{} operations", name),
                name,
                endpoints,
            })
    }

    /// Generate 1-6 capabilities with distinct ids.
    pub fn arb_capabilities() -> impl Strategy<Value = Vec<Capability>> {
        prop::collection::vec(arb_capability(), 1..=6).prop_map(|caps| {
            caps.into_iter()
                .enumerate()
                .map(|(idx, mut cap)| {
                    cap.id = format!("{}_{}", cap.id, idx);
                    cap
                })
                .collect()
        })
    }

    /// Generate a service name, including names that sanitize identically.
    pub fn arb_service_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Jira".to_string()),
            Just("Google Drive".to_string()),
            Just("google-drive".to_string()),
            "[A-Za-z][A-Za-z0-9 .\\-]{0,70}",
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use forge_core::{new_entity_id, now, IntegrationId, IntegrationStatus};
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};

    /// Endpoint without parameters.
    pub fn endpoint(id: &str, method: HttpMethod, path: &str) -> Endpoint {
        Endpoint {
            id: id.to_string(),
            method,
            path: path.to_string(),
            description: format!("Endpoint {}", id),
            parameters: None,
        }
    }

    /// Endpoint with string parameters of the given names.
    pub fn endpoint_with_params(
        id: &str,
        method: HttpMethod,
        path: &str,
        params: &[(&str, ParamType)],
    ) -> Endpoint {
        let parameters = params
            .iter()
            .map(|(name, param_type)| {
                (
                    name.to_string(),
                    ParameterSpec {
                        param_type: *param_type,
                        description: format!("The {}", name),
                    },
                )
            })
            .collect();
        Endpoint {
            parameters: Some(parameters),
            ..endpoint(id, method, path)
        }
    }

    pub fn capability(id: &str, endpoints: Vec<Endpoint>) -> Capability {
        Capability {
            id: id.to_string(),
            name: id.replace('_', " "),
            description: format!("Capability {}", id),
            endpoints,
        }
    }

    /// `[{E1, E2}, {E2, E3}]`: two capabilities sharing one endpoint.
    pub fn jira_capabilities() -> Vec<Capability> {
        let e1 = endpoint("list_issues", HttpMethod::Get, "/rest/api/3/search");
        let e2 = endpoint_with_params(
            "get_issue",
            HttpMethod::Get,
            "/rest/api/3/issue/{issueIdOrKey}",
            &[("issueIdOrKey", ParamType::String)],
        );
        let e3 = endpoint_with_params(
            "create_issue",
            HttpMethod::Post,
            "/rest/api/3/issue",
            &[("summary", ParamType::String), ("priority", ParamType::Number)],
        );
        vec![
            capability("browse_issues", vec![e1, e2.clone()]),
            capability("manage_issues", vec![e2, e3]),
        ]
    }

    /// Connected integration with the given endpoints and no auth.
    pub fn integration(name: &str, endpoints: Vec<Endpoint>) -> Integration {
        Integration {
            id: new_entity_id(),
            name: name.to_string(),
            description: Some(format!("{} integration", name)),
            docs_url: format!("https://docs.example.com/{}", name.to_lowercase()),
            endpoints,
            status: IntegrationStatus::Connected,
            auth_config: None,
            config: BTreeMap::new(),
            created_at: now(),
        }
    }

    pub fn project(name: &str, integration_ids: BTreeSet<IntegrationId>) -> Project {
        Project {
            id: new_entity_id(),
            name: name.to_string(),
            icon: ProjectIcon::Folder,
            integration_ids,
            messages: Vec::new(),
            created_at: now(),
        }
    }

    /// Raw capability analysis output in the provider wire shape.
    pub fn capabilities_json() -> Value {
        json!({
            "capabilities": [
                {
                    "id": "browse_issues",
                    "name": "Browse Issues",
                    "description": "Find and read issues",
                    "endpoints": [
                        {
                            "id": "list_issues",
                            "method": "GET",
                            "path": "/rest/api/3/search",
                            "description": "Search issues with JQL",
                            "parameterList": [
                                {"name": "jql", "type": "string", "description": "JQL query"},
                                {"name": "maxResults", "type": "integer", "description": "Page size"}
                            ]
                        },
                        {
                            "id": "get_issue",
                            "method": "get",
                            "path": "/rest/api/3/issue/{issueIdOrKey}",
                            "description": "Get one issue"
                        }
                    ]
                },
                {
                    "id": "manage_issues",
                    "name": "Manage Issues",
                    "description": "Create and update issues",
                    "endpoints": [
                        {
                            "id": "get_issue",
                            "method": "GET",
                            "path": "/rest/api/3/issue/{issueIdOrKey}",
                            "description": "Get one issue"
                        },
                        {
                            "id": "create_issue",
                            "method": "POST",
                            "path": "/rest/api/3/issue",
                            "description": "Create an issue",
                            "parameterList": []
                        }
                    ]
                }
            ]
        })
    }

    /// Raw auth analysis output for an API-token service.
    pub fn auth_json() -> Value {
        json!({
            "type": "apiKey",
            "fields": [
                {
                    "key": "api_token",
                    "label": "API Token",
                    "type": "password",
                    "required": true,
                    "description": "Create one under account settings",
                    "placeholder": "ATATT..."
                },
                {
                    "key": "domain",
                    "label": "Site URL",
                    "type": "url",
                    "required": true
                }
            ]
        })
    }

    pub fn docs_hint() -> DocsHint {
        DocsHint {
            url: "https://developer.atlassian.com/cloud/jira/platform/rest/v3".to_string(),
            description: "Jira Cloud REST API v3".to_string(),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for pipeline invariants.

    use super::*;
    use std::collections::HashSet;

    /// Assert that no two declarations share a name.
    #[track_caller]
    pub fn assert_unique_tool_names(declarations: &[ToolDeclaration]) {
        let mut seen = HashSet::new();
        for declaration in declarations {
            assert!(
                seen.insert(declaration.name.as_str()),
                "Duplicate tool name: {}",
                declaration.name
            );
            assert!(
                declaration.name.len() <= 64,
                "Tool name too long: {}",
                declaration.name
            );
        }
    }

    /// Assert the extraction contract: 1..=6 capabilities, each with endpoints.
    #[track_caller]
    pub fn assert_valid_capabilities(capabilities: &[Capability]) {
        assert!(
            (1..=6).contains(&capabilities.len()),
            "Expected 1-6 capabilities, got {}",
            capabilities.len()
        );
        for capability in capabilities {
            assert!(
                !capability.endpoints.is_empty(),
                "Capability {} has no endpoints",
                capability.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_provider_replays_in_order() {
        let provider = ScriptedProvider::new();
        provider
            .push_converse(Ok(ConverseReply::text("first")))
            .push_converse(Ok(ConverseReply::text("second")));

        let request = ConverseRequest {
            system_instruction: String::new(),
            history: Vec::new(),
            message: "hi".to_string(),
            tools: Vec::new(),
        };
        let a = provider.converse(&request).await.unwrap();
        let b = provider.converse(&request).await.unwrap();
        let c = provider.converse(&request).await;

        assert_eq!(a.text.as_deref(), Some("first"));
        assert_eq!(b.text.as_deref(), Some("second"));
        assert_eq!(c, Err(LlmError::ProviderNotConfigured));
        assert_eq!(provider.converse_calls(), 3);
    }

    #[test]
    fn test_jira_fixture_shares_one_endpoint() {
        let caps = fixtures::jira_capabilities();
        assert_eq!(caps[0].endpoints[1], caps[1].endpoints[0]);
        assertions::assert_valid_capabilities(&caps);
    }
}
