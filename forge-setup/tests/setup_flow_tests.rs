use async_trait::async_trait;
use forge_core::{AuthType, ForgeResult, HttpMethod, PipelineConfig, SetupError};
use forge_llm::{
    AuthReady, CapabilitiesReady, IntegrationFinalized, ListenerChain, PipelineListener,
};
use forge_setup::{DiscoveryOutcome, SetupSession, SetupStep};
use forge_test_utils::{assertions, fixtures, ScriptedProvider};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<&'static str>>,
}

impl Recorder {
    fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineListener for Recorder {
    async fn on_capabilities_ready(&self, _event: CapabilitiesReady) -> ForgeResult<()> {
        self.events.lock().unwrap().push("capabilities");
        Ok(())
    }

    async fn on_auth_ready(&self, _event: AuthReady) -> ForgeResult<()> {
        self.events.lock().unwrap().push("auth");
        Ok(())
    }

    async fn on_integration_finalized(&self, _event: IntegrationFinalized) -> ForgeResult<()> {
        self.events.lock().unwrap().push("finalized");
        Ok(())
    }
}

#[tokio::test]
async fn discovered_docs_to_connected_integration() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .push_search(Ok(Some(fixtures::docs_hint())))
        .push_capabilities(Ok(fixtures::capabilities_json()))
        .push_auth(Ok(fixtures::auth_json()));

    let recorder = Arc::new(Recorder::default());
    let mut listeners = ListenerChain::new();
    listeners.add(recorder.clone());

    let mut session = SetupSession::new(provider.clone(), PipelineConfig::default(), "Jira")
        .expect("session")
        .with_listeners(listeners);

    let outcome = session.discover().await.expect("discover");
    assert!(matches!(outcome, DiscoveryOutcome::Found(_)));

    let capabilities = session.analyze().await.expect("analyze");
    assertions::assert_valid_capabilities(capabilities);

    let preview = session.preview_tools();
    assert_eq!(preview.len(), 3);
    assertions::assert_unique_tool_names(&preview);

    let (auth, _) = session.wait_for_auth().await.expect("auth");
    assert_eq!(auth.auth_type, AuthType::ApiKey);

    session.toggle_capability("manage_issues").expect("toggle");
    session.continue_to_config().expect("config");
    session
        .set_config_value("api_token", "secret")
        .expect("set token");
    session
        .set_config_value("domain", "https://acme.atlassian.net")
        .expect("set domain");
    session.continue_to_confirm().expect("confirm");
    assert_eq!(session.step(), SetupStep::Confirm);

    let integration = session.finalize().await.expect("finalize");
    let methods: Vec<_> = integration.endpoints.iter().map(|e| e.method).collect();
    assert_eq!(methods, vec![HttpMethod::Get, HttpMethod::Get]);
    let hint = fixtures::docs_hint();
    assert_eq!(integration.description.as_deref(), Some(hint.description.as_str()));
    assert!(integration.missing_required_fields().is_empty());

    assert_eq!(recorder.events(), vec!["capabilities", "auth", "finalized"]);
}

#[tokio::test]
async fn finalized_session_cannot_finalize_again() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .push_capabilities(Ok(fixtures::capabilities_json()))
        .push_auth(Ok(fixtures::auth_json()));

    let recorder = Arc::new(Recorder::default());
    let mut listeners = ListenerChain::new();
    listeners.add(recorder.clone());

    let mut session = SetupSession::new(provider.clone(), PipelineConfig::default(), "Jira")
        .expect("session")
        .with_listeners(listeners);
    session.use_url("https://docs.example.com/jira").expect("url");
    session.analyze().await.expect("analyze");
    session.wait_for_auth().await.expect("auth");
    session.set_config_value("api_token", "secret").expect("token");
    session
        .set_config_value("domain", "https://acme.atlassian.net")
        .expect("domain");

    session.finalize().await.expect("first finalize");
    let second = session.finalize().await;

    assert!(matches!(second, Err(SetupError::WrongStep { .. })));
    assert_eq!(session.step(), SetupStep::Finalized);
    assert_eq!(
        recorder
            .events()
            .iter()
            .filter(|e| **e == "finalized")
            .count(),
        1
    );
}

#[tokio::test]
async fn required_credentials_block_confirm_and_finalize() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .push_capabilities(Ok(fixtures::capabilities_json()))
        .push_auth(Ok(fixtures::auth_json()));

    let mut session = SetupSession::new(provider.clone(), PipelineConfig::default(), "Jira")
        .expect("session");
    session.use_url("https://docs.example.com/jira").expect("url");
    session.analyze().await.expect("analyze");
    session.wait_for_auth().await.expect("auth");
    session.continue_to_config().expect("config");
    session.set_config_value("domain", "https://acme.atlassian.net").expect("domain");
    session.set_config_value("api_token", "   ").expect("blank token");

    let missing = SetupError::MissingCredential {
        key: "api_token".to_string(),
    };
    assert_eq!(session.continue_to_confirm(), Err(missing.clone()));
    assert_eq!(session.finalize().await.map(|i| i.id), Err(missing));
    assert_eq!(session.step(), SetupStep::Config);

    session.set_config_value("api_token", "secret").expect("token");
    session.continue_to_confirm().expect("confirm");
    let integration = session.finalize().await.expect("finalize");
    assert_eq!(integration.config["api_token"], "secret");
}

#[tokio::test]
async fn manual_text_waits_for_defaulted_auth_before_finalizing() {
    let provider = Arc::new(ScriptedProvider::new().with_auth_gate());
    provider
        .push_search(Ok(None))
        .push_capabilities(Ok(fixtures::capabilities_json()))
        .push_auth(Ok(serde_json::json!({"type": "kerberos"})));

    let mut session =
        SetupSession::new(provider.clone(), PipelineConfig::default(), "Internal API")
            .expect("session");

    assert_eq!(session.discover().await.expect("discover"), DiscoveryOutcome::Miss);
    session
        .use_inline_text("GET /issues lists issues")
        .expect("inline text");
    session.analyze().await.expect("analyze");

    provider.wait_for_auth_calls(1).await;
    session.continue_to_config().expect("config");
    assert_eq!(session.continue_to_confirm(), Err(SetupError::AuthPending));
    assert_eq!(
        session.set_config_value("token", "x"),
        Err(SetupError::AuthPending)
    );
    assert_eq!(
        session.finalize().await.map(|i| i.id),
        Err(SetupError::AuthPending)
    );
    assert_eq!(session.step(), SetupStep::Config);

    provider.release_auth();
    let (auth, _) = session.wait_for_auth().await.expect("auth");
    assert!(auth.is_empty_default());
    session.continue_to_confirm().expect("confirm");
    let integration = session.finalize().await.expect("finalize");

    assert_eq!(integration.auth_config, Some(auth));
    assert_eq!(integration.docs_url, "");
    assert_eq!(integration.endpoints.len(), 3);
}
