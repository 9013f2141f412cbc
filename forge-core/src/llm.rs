//! LLM-related primitive types.
//!
//! Pure data types for the provider boundary. Traits and transport live in forge-llm.

use crate::{HttpMethod, IntegrationId, MessageRole, ParameterMap};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// ============================================================================
// DOCUMENTATION SOURCES
// ============================================================================

/// Where capability and auth analysis read the service documentation from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DocumentationSource {
    /// Public documentation URL
    Url(String),
    /// Documentation text uploaded by the user
    InlineText(String),
}

impl DocumentationSource {
    /// Cap inline text at `budget` characters. Never fails; URLs are untouched.
    pub fn truncated(self, budget: usize) -> Self {
        match self {
            Self::InlineText(text) => Self::InlineText(truncate_chars(&text, budget).to_string()),
            url => url,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::InlineText(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Url(url) => url.trim().is_empty(),
            Self::InlineText(text) => text.trim().is_empty(),
        }
    }
}

/// Slice `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Documentation location suggested by the provider's search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocsHint {
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// Which structured analysis to run over a documentation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Capabilities,
    Auth,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capabilities => "capabilities",
            Self::Auth => "auth",
        }
    }
}

/// How an auth inference attempt resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOutcome {
    /// The provider produced a usable config.
    Inferred,
    /// Inference failed and the empty `custom` config was substituted.
    Defaulted,
}

impl AuthOutcome {
    pub fn is_defaulted(&self) -> bool {
        matches!(self, Self::Defaulted)
    }
}

/// Input of one documentation analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub service_name: String,
    pub source: DocumentationSource,
}

// ============================================================================
// TOOL DECLARATIONS
// ============================================================================

/// What a declared tool dispatches to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolBinding {
    /// Unset while the integration is still being set up.
    pub integration_id: Option<IntegrationId>,
    pub integration_name: String,
    pub endpoint_id: String,
    pub method: HttpMethod,
    pub path: String,
}

/// Dispatch-ready schema exposed to the model provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// Never empty: endpoints without parameters get a free-text fallback.
    pub parameters: ParameterMap,
    pub binding: ToolBinding,
}

impl ToolDeclaration {
    /// JSON-schema object for the `parameters` slot of a function declaration.
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    json!({
                        "type": spec.param_type.as_str(),
                        "description": spec.description,
                    }),
                )
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
        })
    }
}

// ============================================================================
// CONVERSATION
// ============================================================================

/// One `{role, content}` pair of windowed history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

/// Everything the provider receives for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverseRequest {
    pub system_instruction: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
    pub tools: Vec<ToolDeclaration>,
}

/// A call the model asked for, before attribution to a declared tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// What the provider answered for one turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConverseReply {
    pub text: Option<String>,
    #[serde(default)]
    pub calls: Vec<ToolCallRequest>,
}

impl ConverseReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            calls: Vec::new(),
        }
    }

    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParamType, ParameterSpec};

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(truncate_chars(text, 2), "hé");
        assert_eq!(truncate_chars(text, 100), text);
        assert_eq!(truncate_chars(text, 0), "");
    }

    #[test]
    fn test_truncated_leaves_urls_alone() {
        let source = DocumentationSource::Url("https://example.com/docs".to_string());
        assert_eq!(source.clone().truncated(3), source);
    }

    #[test]
    fn test_truncated_caps_inline_text() {
        let source = DocumentationSource::InlineText("x".repeat(60_000));
        match source.truncated(50_000) {
            DocumentationSource::InlineText(text) => assert_eq!(text.len(), 50_000),
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_parameters_schema_shape() {
        let mut parameters = ParameterMap::new();
        parameters.insert(
            "limit".to_string(),
            ParameterSpec {
                param_type: ParamType::Number,
                description: "Page size".to_string(),
            },
        );
        let declaration = ToolDeclaration {
            name: "jira_list_issues".to_string(),
            description: "List issues".to_string(),
            parameters,
            binding: ToolBinding {
                integration_id: None,
                integration_name: "Jira".to_string(),
                endpoint_id: "list_issues".to_string(),
                method: HttpMethod::Get,
                path: "/issues".to_string(),
            },
        };
        let schema = declaration.parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["limit"]["type"], "number");
    }
}
