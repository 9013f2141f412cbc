//! OpenAI-compatible model provider
//!
//! Documentation search and analysis use the JSON response format; turns use
//! function tools built from the declared tool set.

use super::client::OpenAIClient;
use super::types::{
    ChatMessage, ChatRequest, ChatResponse, FunctionSpec, ResponseFormat, ResponseToolCall,
    ToolSpec,
};
use crate::providers::invalid_response;
use crate::{parse_json_output, strip_code_fences, ModelProvider};
use async_trait::async_trait;
use forge_core::{
    AnalysisKind, AnalysisRequest, ConverseReply, ConverseRequest, DocsHint,
    DocumentationSource, LlmError, ProviderSettings, ToolCallRequest,
    ToolDeclaration,
};
use serde_json::{json, Map, Value};

const PROVIDER: &str = "openai";

/// Model provider speaking the Chat Completions protocol.
pub struct OpenAIProvider {
    client: OpenAIClient,
    model: String,
    analysis_model: String,
}

impl OpenAIProvider {
    /// Create a provider using `model` for every request.
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client,
            analysis_model: model.clone(),
            model,
        }
    }

    /// Build from configuration plus the API key read by the caller.
    pub fn from_settings(settings: &ProviderSettings, api_key: impl Into<String>) -> Self {
        let client = OpenAIClient::new(
            api_key,
            settings.base_url.clone(),
            settings.requests_per_minute,
        );
        Self::new(client, settings.model.clone())
            .with_analysis_model(settings.analysis_model().to_string())
    }

    pub fn with_analysis_model(mut self, model: impl Into<String>) -> Self {
        self.analysis_model = model.into();
        self
    }

    async fn complete(&self, request: ChatRequest) -> Result<ConverseReply, LlmError> {
        let response: ChatResponse = self.client.request("chat/completions", &request).await?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = %request.model,
                prompt_tokens = usage.prompt_tokens,
                total_tokens = usage.total_tokens,
                "Completion finished"
            );
        }
        reply_from_response(response)
    }

    async fn complete_json(&self, system: &str, prompt: String) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.analysis_model.clone(),
            messages: vec![
                ChatMessage::new("system", system),
                ChatMessage::new("user", prompt),
            ],
            tools: Vec::new(),
            response_format: Some(ResponseFormat::json_object()),
            temperature: Some(0.2),
        };
        let reply = self.complete(request).await?;
        Ok(reply.text.unwrap_or_default())
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn provider_id(&self) -> &str {
        PROVIDER
    }

    async fn search_docs(&self, service_name: &str) -> Result<Option<DocsHint>, LlmError> {
        let text = self
            .complete_json(ANALYST_PERSONA, search_prompt(service_name))
            .await?;
        Ok(parse_docs_hint(&text))
    }

    async fn analyze(
        &self,
        kind: AnalysisKind,
        request: &AnalysisRequest,
    ) -> Result<Value, LlmError> {
        let prompt = match kind {
            AnalysisKind::Capabilities => capabilities_prompt(request),
            AnalysisKind::Auth => auth_prompt(request),
        };
        let text = self.complete_json(ANALYST_PERSONA, prompt).await?;
        if text.trim().is_empty() {
            return Err(invalid_response(PROVIDER, "Empty analysis output"));
        }
        parse_json_output(PROVIDER, &text)
    }

    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseReply, LlmError> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage::new("system", request.system_instruction.clone()));
        messages.extend(
            request
                .history
                .iter()
                .map(|turn| ChatMessage::new(turn.role.as_str(), turn.content.clone())),
        );
        messages.push(ChatMessage::new("user", request.message.clone()));

        let chat = ChatRequest {
            model: self.model.clone(),
            messages,
            tools: request.tools.iter().map(tool_spec).collect(),
            response_format: None,
            temperature: None,
        };
        self.complete(chat).await
    }
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("client", &self.client)
            .field("model", &self.model)
            .field("analysis_model", &self.analysis_model)
            .finish()
    }
}

// ============================================================================
// PROMPTS
// ============================================================================

const ANALYST_PERSONA: &str = "You are an API documentation analyst. \
     You answer with a single JSON object and nothing else.";

fn search_prompt(service_name: &str) -> String {
    format!(
        "Find the official API documentation URL for: {}.\n\
         If you know a high-confidence official URL, return {{\"url\": \"...\", \"description\": \"...\"}}.\n\
         If you cannot identify the official documentation or are unsure, return {{\"url\": null}}.",
        service_name
    )
}

fn source_clause(request: &AnalysisRequest) -> String {
    match &request.source {
        DocumentationSource::Url(url) => {
            format!("the API documentation for {} at {}", request.service_name, url)
        }
        DocumentationSource::InlineText(text) => format!(
            "the following API documentation content for {}.\nContent: {}",
            request.service_name, text
        ),
    }
}

fn capabilities_prompt(request: &AnalysisRequest) -> String {
    format!(
        "Based on {}\n\n\
         Identify 3-6 high-level user capabilities. Do not list raw endpoints directly as \
         capabilities. Instead, group related endpoints into user-friendly capabilities \
         (e.g. \"Manage Issues\", \"User Administration\"). For each capability provide an id, \
         a friendly name, a description, and the endpoints required to fulfill it.\n\n\
         Return {{\"capabilities\": [{{\"id\", \"name\", \"description\", \"endpoints\": \
         [{{\"id\", \"method\" (GET|POST|PUT|DELETE|PATCH), \"path\", \"description\", \
         \"parameterList\": [{{\"name\", \"type\", \"description\"}}]}}]}}]}}.",
        source_clause(request)
    )
}

fn auth_prompt(request: &AnalysisRequest) -> String {
    format!(
        "Based on {}\n\n\
         Identify the authentication requirements. Determine the authentication method \
         (API Key, OAuth2, Basic Auth, or Custom) and the specific fields required \
         (e.g. \"Client ID\", \"Secret Key\", \"Domain\", \"API Token\").\n\n\
         Return {{\"type\": \"apiKey\" | \"oauth2\" | \"basic\" | \"custom\", \"fields\": \
         [{{\"key\": \"unique_key_for_field\", \"label\": \"User Friendly Label\", \
         \"type\": \"text\" | \"password\" | \"url\", \"required\": true, \
         \"description\": \"Where to find this value\", \"placeholder\": \"e.g. sk_test_...\"}}]}}.",
        source_clause(request)
    )
}

// ============================================================================
// RESPONSE MAPPING
// ============================================================================

fn tool_spec(declaration: &ToolDeclaration) -> ToolSpec {
    ToolSpec {
        tool_type: "function".to_string(),
        function: FunctionSpec {
            name: declaration.name.clone(),
            description: declaration.description.clone(),
            parameters: declaration.parameters_schema(),
        },
    }
}

fn reply_from_response(response: ChatResponse) -> Result<ConverseReply, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| invalid_response(PROVIDER, "No completion in response"))?;

    Ok(ConverseReply {
        text: choice.message.content,
        calls: choice
            .message
            .tool_calls
            .into_iter()
            .map(call_request)
            .collect(),
    })
}

/// Decode the JSON-encoded argument string. Anything other than an object is
/// kept verbatim under `raw_arguments`.
fn call_request(call: ResponseToolCall) -> ToolCallRequest {
    let raw = call.function.arguments;
    let args = if raw.trim().is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                let mut map = Map::new();
                map.insert("raw_arguments".to_string(), json!(raw));
                map
            }
        }
    };
    ToolCallRequest {
        name: call.function.name,
        args,
    }
}

fn parse_docs_hint(text: &str) -> Option<DocsHint> {
    let value: Value = serde_json::from_str(strip_code_fences(text)).ok()?;
    let url = value.get("url")?.as_str()?.trim();
    if url.is_empty() {
        return None;
    }
    Some(DocsHint {
        url: url.to_string(),
        description: value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}
