//! Chat turn command/result types
//!
//! The dispatch engine reads a [`TurnContext`] and returns a [`TurnOutcome`];
//! only the registry mutates project state.

use crate::{Integration, Message, MessageRole, ProjectId};
use serde::{Deserialize, Serialize};

/// Read-only snapshot of one project taken when a turn starts.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnContext {
    pub project_id: ProjectId,
    /// Persisted messages, oldest first.
    pub messages: Vec<Message>,
    /// Integrations attached to the project, in registry order.
    pub integrations: Vec<Integration>,
}

impl TurnContext {
    pub fn integration_names(&self) -> Vec<&str> {
        self.integrations.iter().map(|i| i.name.as_str()).collect()
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Rendered,
    /// Provider failed or timed out; the assistant message is the fallback.
    Failed,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rendered => "rendered",
            Self::Failed => "failed",
        }
    }
}

/// Result of one turn, to be applied to the project it was sent for.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub project_id: ProjectId,
    /// Exactly `[user, assistant]`.
    pub messages: Vec<Message>,
    pub status: TurnStatus,
}

impl TurnOutcome {
    pub fn new(
        project_id: ProjectId,
        user: Message,
        assistant: Message,
        status: TurnStatus,
    ) -> Self {
        Self {
            project_id,
            messages: vec![user, assistant],
            status,
        }
    }

    pub fn assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::new_entity_id;

    #[test]
    fn test_outcome_orders_user_then_assistant() {
        let outcome = TurnOutcome::new(
            new_entity_id(),
            Message::user("hi"),
            Message::assistant("hello"),
            TurnStatus::Rendered,
        );
        assert_eq!(outcome.messages[0].role, MessageRole::User);
        assert_eq!(outcome.assistant().map(|m| m.content.as_str()), Some("hello"));
    }
}
