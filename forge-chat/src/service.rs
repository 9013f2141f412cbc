//! Chat command/result loop over a shared registry.

use crate::engine::DispatchEngine;
use crate::welcome::welcome_message;
use forge_core::{ForgeResult, Message, ProjectId, TurnOutcome};
use forge_registry::{Registry, TurnApplication};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of [`ChatService::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentTurn {
    pub outcome: TurnOutcome,
    pub application: TurnApplication,
}

/// Reads a turn context from the registry, runs the turn without holding the
/// registry lock, then hands the outcome back for application.
#[derive(Debug, Clone)]
pub struct ChatService {
    registry: Arc<Mutex<Registry>>,
    engine: DispatchEngine,
}

impl ChatService {
    pub fn new(registry: Arc<Mutex<Registry>>, engine: DispatchEngine) -> Self {
        Self { registry, engine }
    }

    pub fn registry(&self) -> &Arc<Mutex<Registry>> {
        &self.registry
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    /// Make `project_id` active and return its transcript, led by the welcome
    /// seed. The seed is not stored.
    pub async fn open(&self, project_id: ProjectId) -> ForgeResult<Vec<Message>> {
        let mut registry = self.registry.lock().await;
        registry.set_active_project(project_id)?;
        let context = registry.turn_context(project_id)?;

        let mut transcript = Vec::with_capacity(context.messages.len() + 1);
        transcript.push(welcome_message(&context));
        transcript.extend(context.messages);
        Ok(transcript)
    }

    pub async fn send(&self, project_id: ProjectId, input: &str) -> ForgeResult<SentTurn> {
        let context = self.registry.lock().await.turn_context(project_id)?;
        let outcome = self.engine.send(&context, input).await?;
        let application = self
            .registry
            .lock()
            .await
            .apply_turn(outcome.clone())
            .await;
        Ok(SentTurn {
            outcome,
            application,
        })
    }
}
