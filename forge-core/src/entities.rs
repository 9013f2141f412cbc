//! Core entity structures
//!
//! Wire names follow the camelCase shape the provider prompts and the
//! snapshot files use (`docsUrl`, `integrationIds`, `toolCalls`).

use crate::{
    new_entity_id, now, AuthFieldType, AuthType, HttpMethod, IntegrationId, IntegrationStatus,
    MessageId, MessageRole, ParamType, ProjectIcon, ProjectId, Timestamp, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Parameters of an endpoint keyed by parameter name.
pub type ParameterMap = BTreeMap<String, ParameterSpec>;

// ============================================================================
// ENDPOINTS AND CAPABILITIES
// ============================================================================

/// Normalized description of one endpoint parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
}

/// One concrete operation (method + path) of an external service.
///
/// Identity is `id`. Duplicates across capabilities are expected; they are
/// removed when tools are synthesized, not when endpoints are created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub method: HttpMethod,
    pub path: String,
    pub description: String,
    /// `None` means "no parameters"; an empty map is never stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterMap>,
}

impl Endpoint {
    /// `"GET /issues/{id}"` style signature.
    pub fn signature(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.as_ref().map_or(0, |p| p.len())
    }
}

/// User-facing grouping of endpoints, e.g. "Manage Issues".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub name: String,
    pub description: String,
    pub endpoints: Vec<Endpoint>,
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// One credential input required by an external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: AuthFieldType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Inferred authentication scheme and the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    pub fields: Vec<AuthField>,
}

impl AuthConfig {
    /// Safe fallback used whenever inference cannot produce a config.
    pub fn empty_default() -> Self {
        Self {
            auth_type: AuthType::Custom,
            fields: Vec::new(),
        }
    }

    pub fn is_empty_default(&self) -> bool {
        self.auth_type == AuthType::Custom && self.fields.is_empty()
    }

    pub fn field(&self, key: &str) -> Option<&AuthField> {
        self.fields.iter().find(|f| f.key == key)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::empty_default()
    }
}

// ============================================================================
// INTEGRATION
// ============================================================================

/// Finalized record of a connected external service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub id: IntegrationId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub docs_url: String,
    pub endpoints: Vec<Endpoint>,
    pub status: IntegrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_config: Option<AuthConfig>,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    pub created_at: Timestamp,
}

impl Integration {
    /// Config key holding a user-supplied base URL override.
    pub const BASE_URL_KEY: &'static str = "base_url";

    /// Build a connected integration, enforcing the endpoint identity invariant.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        docs_url: impl Into<String>,
        endpoints: Vec<Endpoint>,
        auth_config: Option<AuthConfig>,
        config: BTreeMap<String, String>,
    ) -> Result<Self, ValidationError> {
        let integration = Self {
            id: new_entity_id(),
            name: name.into(),
            description,
            docs_url: docs_url.into(),
            endpoints,
            status: IntegrationStatus::Connected,
            auth_config,
            config,
            created_at: now(),
        };
        integration.validate()?;
        Ok(integration)
    }

    /// Check invariants. Deserialized records go through this before they are
    /// accepted by the registry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if !seen.insert(endpoint.id.as_str()) {
                return Err(ValidationError::DuplicateId {
                    entity: "endpoint",
                    id: endpoint.id.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn endpoint(&self, id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    pub fn base_url(&self) -> Option<&str> {
        self.config
            .get(Self::BASE_URL_KEY)
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }

    /// Required credential fields that still have no value.
    pub fn missing_required_fields(&self) -> Vec<&AuthField> {
        let Some(auth) = &self.auth_config else {
            return Vec::new();
        };
        auth.fields
            .iter()
            .filter(|f| f.required)
            .filter(|f| {
                self.config
                    .get(&f.key)
                    .map_or(true, |value| value.trim().is_empty())
            })
            .collect()
    }
}

// ============================================================================
// PROJECT AND MESSAGES
// ============================================================================

/// Conversation container with a weak reference set of integrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub icon: ProjectIcon,
    pub integration_ids: BTreeSet<IntegrationId>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: Timestamp,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        icon: ProjectIcon,
        integration_ids: BTreeSet<IntegrationId>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            });
        }
        Ok(Self {
            id: new_entity_id(),
            name,
            icon,
            integration_ids,
            messages: Vec::new(),
            created_at: now(),
        })
    }

    pub fn has_integration(&self, id: &IntegrationId) -> bool {
        self.integration_ids.contains(id)
    }
}

/// Where a requested tool call points, or why it could not be attributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResolution {
    #[serde(rename_all = "camelCase")]
    Resolved {
        integration_id: IntegrationId,
        endpoint_id: String,
        method: HttpMethod,
        path: String,
    },
    Unresolved { reason: String },
}

/// A call the model asked for, rendered but never executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
    pub resolution: ToolResolution,
}

impl ToolCallRecord {
    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution, ToolResolution::Resolved { .. })
    }
}

/// One chat message. Messages are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            role,
            content: content.into(),
            timestamp: now(),
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    /// Assistant message carrying requested calls. An empty call list is
    /// stored as no calls.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCallRecord>) -> Self {
        let mut message = Self::assistant(content);
        if !calls.is_empty() {
            message.tool_calls = Some(calls);
        }
        message
    }

    pub fn calls(&self) -> &[ToolCallRecord] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(id: &str) -> Endpoint {
        Endpoint {
            id: id.to_string(),
            method: HttpMethod::Get,
            path: format!("/{}", id),
            description: format!("Endpoint {}", id),
            parameters: None,
        }
    }

    #[test]
    fn test_integration_rejects_duplicate_endpoint_ids() {
        let result = Integration::new(
            "Jira",
            None,
            "https://docs.example.com",
            vec![endpoint("a"), endpoint("b"), endpoint("a")],
            None,
            BTreeMap::new(),
        );
        assert!(matches!(
            result,
            Err(ValidationError::DuplicateId { entity: "endpoint", id }) if id == "a"
        ));
    }

    #[test]
    fn test_integration_serializes_camel_case() {
        let integration = Integration::new(
            "Jira",
            Some("Issue tracker".to_string()),
            "https://docs.example.com",
            vec![endpoint("list")],
            Some(AuthConfig::empty_default()),
            BTreeMap::new(),
        )
        .unwrap();
        let json = serde_json::to_value(&integration).unwrap();
        assert_eq!(json["docsUrl"], "https://docs.example.com");
        assert_eq!(json["status"], "connected");
        assert_eq!(json["authConfig"]["type"], "custom");
        assert!(json["endpoints"][0].get("parameters").is_none());
    }

    #[test]
    fn test_missing_required_fields() {
        let auth = AuthConfig {
            auth_type: AuthType::ApiKey,
            fields: vec![
                AuthField {
                    key: "api_token".to_string(),
                    label: "API Token".to_string(),
                    field_type: AuthFieldType::Password,
                    required: true,
                    description: None,
                    placeholder: None,
                },
                AuthField {
                    key: "domain".to_string(),
                    label: "Domain".to_string(),
                    field_type: AuthFieldType::Url,
                    required: false,
                    description: None,
                    placeholder: None,
                },
            ],
        };
        let mut config = BTreeMap::new();
        config.insert("api_token".to_string(), "  ".to_string());
        let integration = Integration::new(
            "Stripe",
            None,
            "https://stripe.com/docs/api",
            vec![endpoint("charges")],
            Some(auth),
            config,
        )
        .unwrap();

        let missing = integration.missing_required_fields();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].key, "api_token");
    }

    #[test]
    fn test_project_rejects_blank_name() {
        assert!(Project::new("   ", ProjectIcon::Folder, BTreeSet::new()).is_err());
    }

    #[test]
    fn test_assistant_with_empty_calls_has_none() {
        let message = Message::assistant_with_calls("done", Vec::new());
        assert!(message.tool_calls.is_none());
        assert!(message.calls().is_empty());
    }

    #[test]
    fn test_tool_resolution_wire_shape() {
        let record = ToolCallRecord {
            name: "jira_unknown".to_string(),
            args: serde_json::Map::new(),
            resolution: ToolResolution::Unresolved {
                reason: "not declared".to_string(),
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["resolution"]["status"], "unresolved");
        assert!(!record.is_resolved());
    }
}
