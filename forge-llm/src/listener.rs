//! Pipeline listeners
//!
//! Outward notifications for collaborators (UI, audit, persistence hooks).
//! Listener failures are logged and never reach the pipeline.

use async_trait::async_trait;
use forge_core::{
    AuthConfig, AuthOutcome, Capability, ForgeResult, Integration, Message, ProjectId,
};
use std::sync::Arc;

/// Capability extraction finished with a valid result.
#[derive(Debug, Clone)]
pub struct CapabilitiesReady {
    pub service_name: String,
    pub capabilities: Vec<Capability>,
}

/// Auth inference resolved, successfully or to the default.
#[derive(Debug, Clone)]
pub struct AuthReady {
    pub service_name: String,
    pub auth_config: AuthConfig,
    pub outcome: AuthOutcome,
}

/// A setup session produced its integration record.
#[derive(Debug, Clone)]
pub struct IntegrationFinalized {
    pub integration: Integration,
}

/// A turn's messages were appended to a project.
#[derive(Debug, Clone)]
pub struct MessagesAppended {
    pub project_id: ProjectId,
    pub messages: Vec<Message>,
}

/// Async trait for pipeline listeners. Every hook defaults to a no-op.
#[async_trait]
pub trait PipelineListener: Send + Sync {
    async fn on_capabilities_ready(&self, _event: CapabilitiesReady) -> ForgeResult<()> {
        Ok(())
    }

    async fn on_auth_ready(&self, _event: AuthReady) -> ForgeResult<()> {
        Ok(())
    }

    async fn on_integration_finalized(&self, _event: IntegrationFinalized) -> ForgeResult<()> {
        Ok(())
    }

    async fn on_messages_appended(&self, _event: MessagesAppended) -> ForgeResult<()> {
        Ok(())
    }
}

/// Chain of pipeline listeners, notified in registration order.
#[derive(Clone, Default)]
pub struct ListenerChain {
    listeners: Vec<Arc<dyn PipelineListener>>,
}

impl ListenerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Arc<dyn PipelineListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub async fn emit_capabilities_ready(&self, event: CapabilitiesReady) {
        for (idx, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.on_capabilities_ready(event.clone()).await {
                tracing::warn!(
                    listener_index = idx,
                    error = %e,
                    "Capabilities listener failed"
                );
            }
        }
    }

    pub async fn emit_auth_ready(&self, event: AuthReady) {
        for (idx, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.on_auth_ready(event.clone()).await {
                tracing::warn!(
                    listener_index = idx,
                    error = %e,
                    "Auth listener failed"
                );
            }
        }
    }

    pub async fn emit_integration_finalized(&self, event: IntegrationFinalized) {
        for (idx, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.on_integration_finalized(event.clone()).await {
                tracing::warn!(
                    listener_index = idx,
                    error = %e,
                    "Integration listener failed"
                );
            }
        }
    }

    pub async fn emit_messages_appended(&self, event: MessagesAppended) {
        for (idx, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.on_messages_appended(event.clone()).await {
                tracing::warn!(
                    listener_index = idx,
                    error = %e,
                    "Messages listener failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for ListenerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerChain")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{ForgeError, StorageError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        appended: AtomicUsize,
    }

    #[async_trait]
    impl PipelineListener for Counting {
        async fn on_messages_appended(&self, _event: MessagesAppended) -> ForgeResult<()> {
            self.appended.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl PipelineListener for Failing {
        async fn on_messages_appended(&self, _event: MessagesAppended) -> ForgeResult<()> {
            Err(ForgeError::Storage(StorageError::Io {
                reason: "disk full".to_string(),
            }))
        }
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stop_chain() {
        let counting = Arc::new(Counting::default());
        let mut chain = ListenerChain::new();
        chain.add(Arc::new(Failing));
        chain.add(counting.clone());

        chain
            .emit_messages_appended(MessagesAppended {
                project_id: forge_core::new_entity_id(),
                messages: vec![Message::user("hi")],
            })
            .await;

        assert_eq!(counting.appended.load(Ordering::SeqCst), 1);
        assert_eq!(chain.len(), 2);
    }

    #[tokio::test]
    async fn test_default_hooks_are_noops() {
        let mut chain = ListenerChain::new();
        chain.add(Arc::new(Counting::default()));
        chain
            .emit_auth_ready(AuthReady {
                service_name: "Jira".to_string(),
                auth_config: AuthConfig::empty_default(),
                outcome: AuthOutcome::Defaulted,
            })
            .await;
    }
}
