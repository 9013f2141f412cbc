//! Interactive command loop.

use crate::commands::{self, Command, HELP};
use crate::console::Console;
use crate::error::CliError;
use crate::wizard;
use forge_chat::{ChatService, DispatchEngine};
use forge_core::{
    ForgeConfig, IntegrationId, Message, MessageRole, ProjectId, ToolResolution, TurnStatus,
};
use forge_llm::{ListenerChain, ModelProvider};
use forge_registry::{ProjectUpdate, Registry, TurnApplication};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct App {
    config: ForgeConfig,
    provider: Arc<dyn ModelProvider>,
    listeners: ListenerChain,
    chat: ChatService,
    console: Console,
    open_project: Option<ProjectId>,
}

impl App {
    pub fn new(config: ForgeConfig, provider: Arc<dyn ModelProvider>, registry: Registry) -> Self {
        let listeners = ListenerChain::new();
        let registry = registry.with_listeners(listeners.clone());
        let engine = DispatchEngine::new(provider.clone(), config.pipeline.clone());
        Self {
            chat: ChatService::new(Arc::new(Mutex::new(registry)), engine),
            config,
            provider,
            listeners,
            console: Console::new(),
            open_project: None,
        }
    }

    pub async fn run(mut self) -> Result<(), CliError> {
        self.console.say("FORGE. Type /help for commands.");
        loop {
            let label = match self.open_project_name().await {
                Some(name) => format!("{}>", name),
                None => "forge>".to_string(),
            };
            let Some(line) = self.console.prompt(&label).await? else {
                break;
            };
            if line.is_empty() {
                continue;
            }
            let command = match commands::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    self.console.say(e.to_string());
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            if let Err(e) = self.handle(command).await {
                match e {
                    CliError::Io(_) => return Err(e),
                    other => self.console.say(format!("Error: {}", other)),
                }
            }
        }
        self.save().await
    }

    async fn save(&self) -> Result<(), CliError> {
        let registry = self.chat.registry().lock().await;
        registry.save(&self.config.storage.snapshot_path)?;
        Ok(())
    }

    async fn open_project_name(&self) -> Option<String> {
        let id = self.open_project?;
        let registry = self.chat.registry().lock().await;
        registry.project(id).map(|p| p.name.clone())
    }

    async fn integration_id(&self, index: usize) -> Result<IntegrationId, CliError> {
        let registry = self.chat.registry().lock().await;
        registry
            .integrations()
            .get(index - 1)
            .map(|i| i.id)
            .ok_or_else(|| CliError::Usage(format!("no integration {}", index)))
    }

    async fn integration_ids(
        &self,
        indexes: &[usize],
    ) -> Result<BTreeSet<IntegrationId>, CliError> {
        let mut ids = BTreeSet::new();
        for index in indexes {
            ids.insert(self.integration_id(*index).await?);
        }
        Ok(ids)
    }

    async fn project_id(&self, index: usize) -> Result<ProjectId, CliError> {
        let registry = self.chat.registry().lock().await;
        registry
            .projects()
            .get(index - 1)
            .map(|p| p.id)
            .ok_or_else(|| CliError::Usage(format!("no project {}", index)))
    }

    async fn handle(&mut self, command: Command) -> Result<(), CliError> {
        match command {
            Command::Help => self.console.say(HELP),
            Command::Quit => {}
            Command::Integrations => self.list_integrations().await,
            Command::Add { service_name } => {
                let integration = wizard::run_setup(
                    &mut self.console,
                    self.provider.clone(),
                    self.config.pipeline.clone(),
                    self.listeners.clone(),
                    &service_name,
                )
                .await?;
                match integration {
                    Some(integration) => {
                        let name = integration.name.clone();
                        self.chat.registry().lock().await.add_integration(integration)?;
                        self.save().await?;
                        self.console.say(format!("Connected {}.", name));
                    }
                    None => self.console.say("Setup cancelled."),
                }
            }
            Command::Remove { index } => {
                let id = self.integration_id(index).await?;
                let removed = self.chat.registry().lock().await.remove_integration(id)?;
                self.save().await?;
                self.console.say(format!("Removed {}.", removed.name));
            }
            Command::Credentials { index, key, value } => {
                let id = self.integration_id(index).await?;
                self.chat
                    .registry()
                    .lock()
                    .await
                    .update_credentials(id, key, value)?;
                self.save().await?;
            }
            Command::BaseUrl { index, url } => {
                let id = self.integration_id(index).await?;
                self.chat.registry().lock().await.set_base_url(id, &url)?;
                self.save().await?;
            }
            Command::Projects => self.list_projects().await,
            Command::NewProject {
                name,
                icon,
                integrations,
            } => {
                let ids = self.integration_ids(&integrations).await?;
                let id = self
                    .chat
                    .registry()
                    .lock()
                    .await
                    .create_project(name, icon, ids)?;
                self.save().await?;
                self.open(id).await?;
            }
            Command::Attach {
                project,
                integrations,
            } => {
                let id = self.project_id(project).await?;
                let ids = self.integration_ids(&integrations).await?;
                let update = ProjectUpdate {
                    integration_ids: Some(ids),
                    ..ProjectUpdate::default()
                };
                self.chat.registry().lock().await.update_project(id, update)?;
                self.save().await?;
            }
            Command::Rename { project, name } => {
                let id = self.project_id(project).await?;
                let update = ProjectUpdate {
                    name: Some(name),
                    ..ProjectUpdate::default()
                };
                self.chat.registry().lock().await.update_project(id, update)?;
                self.save().await?;
            }
            Command::DeleteProject { index } => {
                let id = self.project_id(index).await?;
                let removed = self.chat.registry().lock().await.delete_project(id)?;
                if self.open_project == Some(id) {
                    self.open_project = None;
                }
                self.save().await?;
                self.console.say(format!("Deleted {}.", removed.name));
            }
            Command::Open { index } => {
                let id = self.project_id(index).await?;
                self.open(id).await?;
            }
            Command::Close => {
                self.chat.registry().lock().await.clear_active_project();
                self.open_project = None;
            }
            Command::Say(text) => self.say(&text).await?,
        }
        Ok(())
    }

    async fn open(&mut self, id: ProjectId) -> Result<(), CliError> {
        let transcript = self.chat.open(id).await?;
        self.open_project = Some(id);
        for message in &transcript {
            self.print_message(message);
        }
        Ok(())
    }

    async fn say(&mut self, text: &str) -> Result<(), CliError> {
        let Some(project_id) = self.open_project else {
            self.console.say("Open a project first (/projects, /open <p>).");
            return Ok(());
        };
        let sent = self.chat.send(project_id, text).await?;
        if let Some(reply) = sent.outcome.assistant() {
            self.print_message(reply);
        }
        if sent.outcome.status == TurnStatus::Failed {
            self.console.say("(the provider could not be reached)");
        }
        if sent.application == TurnApplication::Applied {
            self.save().await?;
        }
        Ok(())
    }

    fn print_message(&self, message: &Message) {
        let who = match message.role {
            MessageRole::User => "you",
            MessageRole::Assistant => "forge",
            MessageRole::System => "system",
        };
        self.console.say(format!("{}: {}", who, message.content));
        for call in message.calls() {
            let target = match &call.resolution {
                ToolResolution::Resolved { method, path, .. } => format!("{} {}", method, path),
                ToolResolution::Unresolved { reason } => format!("unresolved: {}", reason),
            };
            let args = render_args(&call.args);
            self.console.say(format!("  -> {}({}) [{}]", call.name, args, target));
        }
    }

    async fn list_integrations(&self) {
        let registry = self.chat.registry().lock().await;
        if registry.integrations().is_empty() {
            self.console.say("No integrations yet. Add one with /add <service>.");
            return;
        }
        for (idx, integration) in registry.integrations().iter().enumerate() {
            let missing = integration.missing_required_fields().len();
            let note = if missing > 0 {
                format!(", {} credential(s) missing", missing)
            } else {
                String::new()
            };
            self.console.say(format!(
                "  {}. {} ({} endpoints{})",
                idx + 1,
                integration.name,
                integration.endpoints.len(),
                note
            ));
        }
    }

    async fn list_projects(&self) {
        let registry = self.chat.registry().lock().await;
        if registry.projects().is_empty() {
            self.console.say("No projects yet. Create one with /new <name>.");
            return;
        }
        for (idx, project) in registry.projects().iter().enumerate() {
            let names: Vec<&str> = registry
                .integrations()
                .iter()
                .filter(|i| project.has_integration(&i.id))
                .map(|i| i.name.as_str())
                .collect();
            self.console.say(format!(
                "  {}. {} {} [{}] {} messages",
                idx + 1,
                project.icon.glyph(),
                project.name,
                names.join(", "),
                project.messages.len()
            ));
        }
    }
}

fn render_args(args: &serde_json::Map<String, serde_json::Value>) -> String {
    args.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
