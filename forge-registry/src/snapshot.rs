//! JSON snapshot persistence.

use crate::registry::Registry;
use forge_core::{Integration, Project, ProjectId, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk form of a [`Registry`]. Listeners are not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub version: u32,
    #[serde(default)]
    pub integrations: Vec<Integration>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub active_project_id: Option<ProjectId>,
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Io {
        reason: format!("{}: {}", path.display(), err),
    }
}

impl Registry {
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            version: SNAPSHOT_VERSION,
            integrations: self.integrations.clone(),
            projects: self.projects.clone(),
            active_project_id: self.active_project,
        }
    }

    /// Rebuild a registry from a snapshot.
    ///
    /// Integrations are re-validated. Project references to integrations that
    /// are not in the snapshot are dropped, as is a dangling active project.
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Result<Self, StorageError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StorageError::Serialization {
                reason: format!("unsupported snapshot version {}", snapshot.version),
            });
        }

        let mut ids = HashSet::new();
        for integration in &snapshot.integrations {
            integration
                .validate()
                .map_err(|e| StorageError::Serialization {
                    reason: format!("integration {}: {}", integration.id, e),
                })?;
            if !ids.insert(integration.id) {
                return Err(StorageError::DuplicateIntegration { id: integration.id });
            }
        }

        let mut projects = snapshot.projects;
        for project in &mut projects {
            let before = project.integration_ids.len();
            project.integration_ids.retain(|id| ids.contains(id));
            if project.integration_ids.len() != before {
                tracing::warn!(
                    project_id = %project.id,
                    dropped = before - project.integration_ids.len(),
                    "Dropped references to missing integrations"
                );
            }
        }

        let active_project = snapshot
            .active_project_id
            .filter(|id| projects.iter().any(|p| p.id == *id));

        let mut registry = Registry::new();
        registry.integrations = snapshot.integrations;
        registry.projects = projects;
        registry.active_project = active_project;
        Ok(registry)
    }

    /// Write the registry as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let contents =
            serde_json::to_string_pretty(&self.snapshot()).map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })?;
        std::fs::write(path, contents).map_err(|e| io_error(path, e))?;
        tracing::debug!(path = %path.display(), "Registry saved");
        Ok(())
    }

    /// Load a registry. A missing file yields an empty registry.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Ok(Registry::new());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let snapshot: RegistrySnapshot =
            serde_json::from_str(&contents).map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })?;
        Registry::from_snapshot(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{HttpMethod, ProjectIcon};
    use forge_test_utils::fixtures;
    use std::collections::BTreeSet;

    #[test]
    fn test_missing_file_is_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::load(&dir.path().join("absent.json")).unwrap();
        assert!(registry.integrations().is_empty());
        assert!(registry.projects().is_empty());
    }

    #[test]
    fn test_save_and_load_keep_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("forge.json");

        let mut registry = Registry::new();
        let jira = registry
            .add_integration(fixtures::integration(
                "Jira",
                vec![fixtures::endpoint("get_issue", HttpMethod::Get, "/issue/{id}")],
            ))
            .unwrap();
        let project = registry
            .create_project("Ops", ProjectIcon::Globe, [jira].into_iter().collect())
            .unwrap();
        registry.set_active_project(project).unwrap();
        registry.save(&path).unwrap();

        let loaded = Registry::load(&path).unwrap();
        assert_eq!(loaded.integrations(), registry.integrations());
        assert_eq!(loaded.projects(), registry.projects());
        assert_eq!(loaded.active_project().map(|p| p.id), Some(project));
    }

    #[test]
    fn test_dangling_references_pruned() {
        let kept = fixtures::integration("Kept", Vec::new());
        let missing = forge_core::new_entity_id();
        let ids: BTreeSet<_> = [kept.id, missing].into_iter().collect();
        let project = fixtures::project("P", ids);
        let snapshot = RegistrySnapshot {
            version: SNAPSHOT_VERSION,
            integrations: vec![kept.clone()],
            projects: vec![project],
            active_project_id: Some(forge_core::new_entity_id()),
        };

        let registry = Registry::from_snapshot(snapshot).unwrap();
        let ids: Vec<_> = registry.projects()[0].integration_ids.iter().copied().collect();
        assert_eq!(ids, vec![kept.id]);
        assert!(registry.active_project().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Registry::load(&path),
            Err(StorageError::Serialization { .. })
        ));
    }

    #[test]
    fn test_duplicate_endpoint_ids_rejected_on_load() {
        let endpoint = fixtures::endpoint("same", HttpMethod::Get, "/");
        let integration = fixtures::integration("Dup", vec![endpoint.clone(), endpoint]);
        let snapshot = RegistrySnapshot {
            version: SNAPSHOT_VERSION,
            integrations: vec![integration],
            projects: Vec::new(),
            active_project_id: None,
        };
        assert!(matches!(
            Registry::from_snapshot(snapshot),
            Err(StorageError::Serialization { .. })
        ));
    }
}
