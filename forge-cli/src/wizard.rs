//! Interactive integration setup.

use crate::console::Console;
use crate::error::CliError;
use forge_core::{
    AuthConfig, AuthOutcome, DocumentationSource, Integration, PipelineConfig, SetupError,
};
use forge_llm::{ListenerChain, ModelProvider};
use forge_setup::{DiscoveryOutcome, SetupSession};
use std::path::Path;
use std::sync::Arc;

/// Documentation answer typed by the user: a URL, or `@path` to a text file.
pub async fn read_documentation(answer: &str) -> Result<DocumentationSource, CliError> {
    match answer.strip_prefix('@') {
        Some(path) => {
            let text = tokio::fs::read_to_string(Path::new(path.trim())).await?;
            Ok(DocumentationSource::InlineText(text))
        }
        None => Ok(DocumentationSource::Url(answer.to_string())),
    }
}

/// Walk one service through setup. `Ok(None)` when the user abandons it.
pub async fn run_setup(
    console: &mut Console,
    provider: Arc<dyn ModelProvider>,
    pipeline: PipelineConfig,
    listeners: ListenerChain,
    service_name: &str,
) -> Result<Option<Integration>, CliError> {
    let mut session =
        SetupSession::new(provider, pipeline, service_name)?.with_listeners(listeners);

    if !choose_documentation(console, &mut session).await? {
        return Ok(None);
    }

    loop {
        console.say("Analyzing documentation...");
        match session.analyze().await {
            Ok(_) => break,
            Err(e) => {
                console.say(format!("Analysis failed: {}", e));
                if !console.confirm("Try again?", false).await? {
                    return Ok(None);
                }
            }
        }
    }

    if !choose_capabilities(console, &mut session).await? {
        return Ok(None);
    }
    session.continue_to_config()?;

    let auth = resolve_auth(console, &mut session).await?;
    for field in &auth.fields {
        let marker = if field.required { " (required)" } else { "" };
        let mut label = format!("{}{}", field.label, marker);
        if let Some(placeholder) = &field.placeholder {
            label.push_str(&format!(" e.g. {}", placeholder));
        }
        loop {
            let Some(value) = console.prompt(&format!("{}:", label)).await? else {
                return Ok(None);
            };
            if field.required && value.trim().is_empty() {
                console.say(format!("{} is required.", field.label));
                continue;
            }
            session.set_config_value(field.key.clone(), value)?;
            break;
        }
    }

    session.continue_to_confirm()?;
    console.say(format!("{} will expose these tools:", session.service_name()));
    for tool in session.preview_tools() {
        console.say(format!("  {}  {} {}", tool.name, tool.binding.method, tool.binding.path));
    }
    if !console.confirm("Create integration?", true).await? {
        return Ok(None);
    }
    Ok(Some(session.finalize().await?))
}

async fn choose_documentation(
    console: &mut Console,
    session: &mut SetupSession,
) -> Result<bool, CliError> {
    console.say(format!("Searching for {} documentation...", session.service_name()));
    if let DiscoveryOutcome::Found(hint) = session.discover().await? {
        console.say(format!("Found: {}", hint.url));
        if !hint.description.is_empty() {
            console.say(format!("  {}", hint.description));
        }
        if console.confirm("Use this documentation?", true).await? {
            return Ok(true);
        }
    } else {
        console.say("No documentation found.");
    }

    loop {
        let Some(answer) = console
            .prompt("Documentation URL, or @path to a text file (blank to cancel):")
            .await?
        else {
            return Ok(false);
        };
        if answer.is_empty() {
            return Ok(false);
        }
        let source = match read_documentation(&answer).await {
            Ok(source) => source,
            Err(e) => {
                console.say(format!("Could not read documentation: {}", e));
                continue;
            }
        };
        let result = match source {
            DocumentationSource::Url(url) => session.use_url(url),
            DocumentationSource::InlineText(text) => session.use_inline_text(text),
        };
        match result {
            Ok(()) => return Ok(true),
            Err(SetupError::MissingDocumentation) => console.say("That documentation is empty."),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn choose_capabilities(
    console: &mut Console,
    session: &mut SetupSession,
) -> Result<bool, CliError> {
    loop {
        console.say("Capabilities:");
        for (idx, capability) in session.capabilities().iter().enumerate() {
            let mark = if session.is_selected(&capability.id) { "x" } else { " " };
            console.say(format!(
                "  [{}] {}. {} - {} ({} endpoints)",
                mark,
                idx + 1,
                capability.name,
                capability.description,
                capability.endpoints.len()
            ));
        }

        let Some(answer) = console
            .prompt("Numbers to toggle, blank to continue, q to cancel:")
            .await?
        else {
            return Ok(false);
        };
        if answer.eq_ignore_ascii_case("q") {
            return Ok(false);
        }
        if answer.is_empty() {
            if session.selected_capabilities().is_empty() {
                console.say("Select at least one capability.");
                continue;
            }
            return Ok(true);
        }

        for token in answer.split_whitespace() {
            let id = token
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|idx| session.capabilities().get(idx))
                .map(|c| c.id.clone());
            match id {
                Some(id) => {
                    session.toggle_capability(&id)?;
                }
                None => console.say(format!("No capability {}", token)),
            }
        }
    }
}

async fn resolve_auth(
    console: &mut Console,
    session: &mut SetupSession,
) -> Result<AuthConfig, CliError> {
    loop {
        console.say("Inferring authentication...");
        let (config, outcome) = session.wait_for_auth().await?;
        match outcome {
            AuthOutcome::Inferred => {
                console.say(format!("Authentication: {}", config.auth_type));
                return Ok(config);
            }
            AuthOutcome::Defaulted => {
                console.say("Could not infer authentication requirements.");
                if !console.confirm("Retry?", false).await? {
                    return Ok(config);
                }
                session.retry_auth()?;
            }
        }
    }
}
