//! FORGE LLM - Provider Boundary
//!
//! Provider-agnostic trait for documentation search, structured analysis and
//! tool-enabled conversation, plus the listener chain the pipeline reports to.
//! A concrete OpenAI-compatible provider lives in [`providers`].

pub mod listener;
pub mod providers;

pub use listener::{
    AuthReady, CapabilitiesReady, IntegrationFinalized, ListenerChain, MessagesAppended,
    PipelineListener,
};

use async_trait::async_trait;
use forge_core::{
    AnalysisKind, AnalysisRequest, ConverseReply, ConverseRequest, DocsHint, LlmError,
};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

// ============================================================================
// MODEL PROVIDER TRAIT
// ============================================================================

/// Trait for model providers.
/// Implementations must be thread-safe (Send + Sync) and are shared as
/// `Arc<dyn ModelProvider>`.
///
/// # Example
/// ```ignore
/// struct MyProvider { /* ... */ }
///
/// #[async_trait]
/// impl ModelProvider for MyProvider {
///     async fn search_docs(&self, service_name: &str) -> Result<Option<DocsHint>, LlmError> {
///         // Ask the model where the docs live
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Stable identifier used in logs and errors.
    fn provider_id(&self) -> &str;

    /// Best-effort lookup of a documentation URL. `Ok(None)` when nothing was found.
    async fn search_docs(&self, service_name: &str) -> Result<Option<DocsHint>, LlmError>;

    /// Run a structured analysis and return the raw JSON the model produced.
    ///
    /// Shape validation is the caller's job.
    async fn analyze(
        &self,
        kind: AnalysisKind,
        request: &AnalysisRequest,
    ) -> Result<Value, LlmError>;

    /// One tool-enabled conversation turn.
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseReply, LlmError>;
}

// ============================================================================
// RESPONSE HELPERS
// ============================================================================

/// Strip a surrounding markdown code fence (```` ```json ```` or bare ```` ``` ````).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse model output as JSON, tolerating code fences.
pub fn parse_json_output(provider: &str, text: &str) -> Result<Value, LlmError> {
    serde_json::from_str(strip_code_fences(text)).map_err(|e| LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: format!("Output is not valid JSON: {}", e),
    })
}

/// Bound a provider call. Elapsed time maps to [`LlmError::Timeout`].
pub async fn with_timeout<T, F>(operation: &str, timeout: Duration, fut: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_with_language() {
        let text = "```json\n{\"capabilities\": []}\n```";
        assert_eq!(strip_code_fences(text), "{\"capabilities\": []}");
    }

    #[test]
    fn test_strip_code_fences_bare() {
        assert_eq!(strip_code_fences("```\n[1, 2]\n```\n"), "[1, 2]");
    }

    #[test]
    fn test_strip_code_fences_passthrough() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_json_output_rejects_prose() {
        let result = parse_json_output("test", "Here are the capabilities you asked for");
        assert!(matches!(result, Err(LlmError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let result: Result<(), LlmError> = with_timeout(
            "converse",
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
        )
        .await;
        assert_eq!(
            result,
            Err(LlmError::Timeout {
                operation: "converse".to_string(),
                timeout_ms: 10,
            })
        );
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout("analyze", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Fenced and unfenced JSON objects parse to the same value.
        #[test]
        fn prop_fenced_json_parses_like_plain(key in "[a-z]{1,12}", value in any::<i64>()) {
            let plain = format!("{{\"{}\": {}}}", key, value);
            let fenced = format!("```json\n{}\n```", plain);
            let a = parse_json_output("test", &plain).unwrap();
            let b = parse_json_output("test", &fenced).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
