//! In-memory ownership container for integrations and projects.

use forge_core::{
    ForgeResult, Integration, IntegrationId, Project, ProjectIcon, ProjectId, StorageError,
    TurnContext, TurnOutcome, ValidationError,
};
use forge_llm::{ListenerChain, MessagesAppended};
use std::collections::BTreeSet;

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// Update payload for projects. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub icon: Option<ProjectIcon>,
    /// Replaces the attached set.
    pub integration_ids: Option<BTreeSet<IntegrationId>>,
}

/// What happened to a turn outcome handed to [`Registry::apply_turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnApplication {
    /// Messages were appended to the project.
    Applied,
    /// The project is no longer active or no longer exists; nothing changed.
    Discarded,
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Owns every integration and project.
///
/// Projects hold integration ids only; removing an integration strips it from
/// every project.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) integrations: Vec<Integration>,
    pub(crate) projects: Vec<Project>,
    pub(crate) active_project: Option<ProjectId>,
    listeners: ListenerChain,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listeners(mut self, listeners: ListenerChain) -> Self {
        self.listeners = listeners;
        self
    }

    // === Integration Operations ===

    pub fn add_integration(&mut self, integration: Integration) -> ForgeResult<IntegrationId> {
        integration.validate()?;
        if self.integration(integration.id).is_some() {
            return Err(StorageError::DuplicateIntegration { id: integration.id }.into());
        }
        let id = integration.id;
        tracing::info!(integration_id = %id, name = %integration.name, "Integration added");
        self.integrations.push(integration);
        Ok(id)
    }

    pub fn integration(&self, id: IntegrationId) -> Option<&Integration> {
        self.integrations.iter().find(|i| i.id == id)
    }

    /// All integrations in insertion order.
    pub fn integrations(&self) -> &[Integration] {
        &self.integrations
    }

    fn integration_mut(&mut self, id: IntegrationId) -> Result<&mut Integration, StorageError> {
        self.integrations
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StorageError::IntegrationNotFound { id })
    }

    pub fn update_credentials(
        &mut self,
        id: IntegrationId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> ForgeResult<()> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "key".to_string(),
            }
            .into());
        }
        let integration = self.integration_mut(id)?;
        integration.config.insert(key, value.into());
        Ok(())
    }

    /// Set or, with a blank value, clear the base URL override.
    pub fn set_base_url(&mut self, id: IntegrationId, url: &str) -> ForgeResult<()> {
        let integration = self.integration_mut(id)?;
        let url = url.trim();
        if url.is_empty() {
            integration.config.remove(Integration::BASE_URL_KEY);
        } else {
            integration
                .config
                .insert(Integration::BASE_URL_KEY.to_string(), url.to_string());
        }
        Ok(())
    }

    /// Remove an integration and detach it from every project.
    pub fn remove_integration(&mut self, id: IntegrationId) -> ForgeResult<Integration> {
        let idx = self
            .integrations
            .iter()
            .position(|i| i.id == id)
            .ok_or(StorageError::IntegrationNotFound { id })?;
        let removed = self.integrations.remove(idx);

        let mut detached = 0usize;
        for project in &mut self.projects {
            if project.integration_ids.remove(&id) {
                detached += 1;
            }
        }
        tracing::info!(integration_id = %id, projects = detached, "Integration removed");
        Ok(removed)
    }

    // === Project Operations ===

    fn check_integration_ids(&self, ids: &BTreeSet<IntegrationId>) -> Result<(), StorageError> {
        match ids.iter().find(|id| self.integration(**id).is_none()) {
            Some(id) => Err(StorageError::IntegrationNotFound { id: *id }),
            None => Ok(()),
        }
    }

    pub fn create_project(
        &mut self,
        name: impl Into<String>,
        icon: ProjectIcon,
        integration_ids: BTreeSet<IntegrationId>,
    ) -> ForgeResult<ProjectId> {
        self.check_integration_ids(&integration_ids)?;
        let project = Project::new(name, icon, integration_ids)?;
        let id = project.id;
        self.projects.push(project);
        Ok(id)
    }

    pub fn update_project(&mut self, id: ProjectId, update: ProjectUpdate) -> ForgeResult<()> {
        if let Some(ids) = &update.integration_ids {
            self.check_integration_ids(ids)?;
        }
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(ValidationError::RequiredFieldMissing {
                    field: "name".to_string(),
                }
                .into());
            }
        }

        let project = self
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StorageError::ProjectNotFound { id })?;
        if let Some(name) = update.name {
            project.name = name;
        }
        if let Some(icon) = update.icon {
            project.icon = icon;
        }
        if let Some(ids) = update.integration_ids {
            project.integration_ids = ids;
        }
        Ok(())
    }

    /// Delete a project. Deleting the active project clears the selection.
    pub fn delete_project(&mut self, id: ProjectId) -> ForgeResult<Project> {
        let idx = self
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or(StorageError::ProjectNotFound { id })?;
        if self.active_project == Some(id) {
            self.active_project = None;
        }
        Ok(self.projects.remove(idx))
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    // === Active Project ===

    pub fn set_active_project(&mut self, id: ProjectId) -> ForgeResult<()> {
        if self.project(id).is_none() {
            return Err(StorageError::ProjectNotFound { id }.into());
        }
        self.active_project = Some(id);
        Ok(())
    }

    pub fn clear_active_project(&mut self) {
        self.active_project = None;
    }

    pub fn active_project(&self) -> Option<&Project> {
        self.active_project.and_then(|id| self.project(id))
    }

    // === Turns ===

    /// Snapshot of a project's messages and attached integrations.
    pub fn turn_context(&self, project_id: ProjectId) -> ForgeResult<TurnContext> {
        let project = self
            .project(project_id)
            .ok_or(StorageError::ProjectNotFound { id: project_id })?;
        let integrations = self
            .integrations
            .iter()
            .filter(|i| project.has_integration(&i.id))
            .cloned()
            .collect();
        Ok(TurnContext {
            project_id,
            messages: project.messages.clone(),
            integrations,
        })
    }

    /// Append a turn's messages if its project is still the active one.
    pub async fn apply_turn(&mut self, outcome: TurnOutcome) -> TurnApplication {
        if self.active_project != Some(outcome.project_id) {
            tracing::info!(
                project_id = %outcome.project_id,
                status = outcome.status.as_str(),
                "Discarding turn for inactive project"
            );
            return TurnApplication::Discarded;
        }
        let Some(project) = self.projects.iter_mut().find(|p| p.id == outcome.project_id) else {
            tracing::info!(project_id = %outcome.project_id, "Discarding turn for deleted project");
            return TurnApplication::Discarded;
        };

        project.messages.extend(outcome.messages.iter().cloned());
        self.listeners
            .emit_messages_appended(MessagesAppended {
                project_id: outcome.project_id,
                messages: outcome.messages,
            })
            .await;
        TurnApplication::Applied
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use forge_test_utils::{fixtures, generators::arb_project_icon};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// After any sequence of removals no project references a missing
        /// integration.
        #[test]
        fn prop_no_dangling_references(
            attach in prop::collection::vec(prop::collection::vec(any::<bool>(), 4), 1..5),
            remove in prop::collection::vec(any::<bool>(), 4),
            icon in arb_project_icon(),
        ) {
            let mut registry = Registry::new();
            let ids: Vec<IntegrationId> = (0..4)
                .map(|i| {
                    registry
                        .add_integration(fixtures::integration(&format!("Service {}", i), Vec::new()))
                        .unwrap()
                })
                .collect();

            for (n, mask) in attach.iter().enumerate() {
                let attached = ids
                    .iter()
                    .zip(mask)
                    .filter(|(_, on)| **on)
                    .map(|(id, _)| *id)
                    .collect();
                registry.create_project(format!("P{}", n), icon, attached).unwrap();
            }
            for (id, gone) in ids.iter().zip(&remove) {
                if *gone {
                    registry.remove_integration(*id).unwrap();
                }
            }

            for project in registry.projects() {
                for id in &project.integration_ids {
                    prop_assert!(registry.integration(*id).is_some());
                }
            }
        }
    }
}
