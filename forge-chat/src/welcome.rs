//! Welcome seed shown when a project is opened.
//!
//! The seed is rendered, never persisted, and never part of the history sent
//! to the provider.

use forge_core::{Message, TurnContext};

pub const NO_INTEGRATIONS_WELCOME: &str =
    "Welcome! This project doesn't have any integrations yet. Add some to get started.";

pub fn welcome_text(integration_names: &[&str]) -> String {
    if integration_names.is_empty() {
        NO_INTEGRATIONS_WELCOME.to_string()
    } else {
        format!(
            "Hello! This project is connected to {}. How can I help you?",
            integration_names.join(", ")
        )
    }
}

pub fn welcome_message(context: &TurnContext) -> Message {
    Message::assistant(welcome_text(&context.integration_names()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_integrations() {
        assert_eq!(welcome_text(&[]), NO_INTEGRATIONS_WELCOME);
    }

    #[test]
    fn test_names_joined() {
        assert_eq!(
            welcome_text(&["Jira", "GitHub"]),
            "Hello! This project is connected to Jira, GitHub. How can I help you?"
        );
    }
}
