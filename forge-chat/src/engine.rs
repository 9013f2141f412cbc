//! Conversational tool-dispatch engine
//!
//! One turn is `Idle -> Sending -> (Rendered | Failed) -> Idle`. The engine
//! reads a [`TurnContext`] and returns a [`TurnOutcome`]; it never touches
//! project state. Requested tool calls are attributed to declared tools and
//! rendered, never executed.

use forge_core::{
    ChatTurn, ConverseReply, ConverseRequest, DispatchError, Message, PipelineConfig, ProjectId,
    ToolCallRecord, ToolCallRequest, ToolResolution, TurnContext, TurnOutcome, TurnStatus,
};
use forge_llm::{with_timeout, ModelProvider};
use forge_setup::{tool_set_for, ToolSet};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const SYSTEM_INSTRUCTION: &str = "You are an MCP Forge agent. You help users interact \
with their connected integrations. You have access to tools derived from REST APIs. When a \
user asks to perform an action related to an integration, use the appropriate tool. If you use \
a tool, explain what you are doing. If you don't have a specific tool, inform the user you can \
only use connected integrations.";

/// Rendered when the provider answers without text.
pub const EMPTY_REPLY_TEXT: &str = "I processed your request, but had no text output.";

/// Rendered when the provider fails or times out.
pub const FAILURE_TEXT: &str =
    "Sorry, I encountered an error connecting to the intelligence core.";

/// Observable turn state of one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
}

type InFlight = Arc<Mutex<HashSet<ProjectId>>>;

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashSet<ProjectId>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a project as sending until dropped.
struct InFlightGuard {
    in_flight: InFlight,
    project_id: ProjectId,
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, project_id: ProjectId) -> Result<Self, DispatchError> {
        if !lock(in_flight).insert(project_id) {
            return Err(DispatchError::TurnInFlight { project_id });
        }
        Ok(Self {
            in_flight: in_flight.clone(),
            project_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.project_id);
    }
}

/// Runs chat turns against a model provider.
///
/// Cheap to clone; clones share the in-flight set.
#[derive(Clone)]
pub struct DispatchEngine {
    provider: Arc<dyn ModelProvider>,
    config: PipelineConfig,
    in_flight: InFlight,
}

impl DispatchEngine {
    pub fn new(provider: Arc<dyn ModelProvider>, config: PipelineConfig) -> Self {
        Self {
            provider,
            config,
            in_flight: InFlight::default(),
        }
    }

    pub fn state(&self, project_id: ProjectId) -> TurnState {
        if lock(&self.in_flight).contains(&project_id) {
            TurnState::Sending
        } else {
            TurnState::Idle
        }
    }

    /// Run one turn for the project in `context`.
    ///
    /// Blank input and a second turn for a project that is already sending
    /// are rejected before the provider is called. Provider failure is not an
    /// error: it yields a [`TurnStatus::Failed`] outcome with a fallback reply.
    pub async fn send(
        &self,
        context: &TurnContext,
        input: &str,
    ) -> Result<TurnOutcome, DispatchError> {
        if input.trim().is_empty() {
            return Err(DispatchError::EmptyInput);
        }
        let _guard = InFlightGuard::acquire(&self.in_flight, context.project_id)?;

        let tools = tool_set_for(&context.integrations);
        let request = ConverseRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            history: history_window(&context.messages, self.config.history_window),
            message: input.to_string(),
            tools: tools.declarations().to_vec(),
        };

        let result = with_timeout(
            "chat turn",
            self.config.provider_timeout(),
            self.provider.converse(&request),
        )
        .await;

        let user = Message::user(input);
        let outcome = match result {
            Ok(reply) => {
                let assistant = render_reply(context.project_id, reply, &tools);
                TurnOutcome::new(context.project_id, user, assistant, TurnStatus::Rendered)
            }
            Err(e) => {
                tracing::warn!(
                    project_id = %context.project_id,
                    error = %e,
                    "Chat turn failed"
                );
                let assistant = Message::assistant(FAILURE_TEXT);
                TurnOutcome::new(context.project_id, user, assistant, TurnStatus::Failed)
            }
        };
        Ok(outcome)
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("provider", &self.provider.provider_id())
            .field("in_flight", &lock(&self.in_flight).len())
            .finish()
    }
}

/// The last `window` messages as `{role, content}` pairs, oldest first.
pub fn history_window(messages: &[Message], window: usize) -> Vec<ChatTurn> {
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(|m| ChatTurn {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}

/// Attribute a requested call to a declared tool.
pub fn resolve_call(call: ToolCallRequest, tools: &ToolSet) -> ToolCallRecord {
    let resolution = match tools.resolve(&call.name) {
        Some(binding) => match binding.integration_id {
            Some(integration_id) => ToolResolution::Resolved {
                integration_id,
                endpoint_id: binding.endpoint_id.clone(),
                method: binding.method,
                path: binding.path.clone(),
            },
            None => ToolResolution::Unresolved {
                reason: format!("tool {} is not bound to a connected integration", call.name),
            },
        },
        None => ToolResolution::Unresolved {
            reason: format!("no declared tool named {}", call.name),
        },
    };
    ToolCallRecord {
        name: call.name,
        args: call.args,
        resolution,
    }
}

fn render_reply(project_id: ProjectId, reply: ConverseReply, tools: &ToolSet) -> Message {
    let calls: Vec<ToolCallRecord> = reply
        .calls
        .into_iter()
        .map(|call| resolve_call(call, tools))
        .collect();

    for call in calls.iter().filter(|c| !c.is_resolved()) {
        tracing::warn!(
            project_id = %project_id,
            tool = %call.name,
            "Provider requested an undeclared tool"
        );
    }

    let text = reply
        .text
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| EMPTY_REPLY_TEXT.to_string());
    Message::assistant_with_calls(text, calls)
}

// ============================================================================
// TESTS
// ============================================================================
