//! Capability extraction
//!
//! One structured analysis request per call. The result is all-or-nothing:
//! any contract violation fails the whole extraction.

use crate::normalizer::{normalize_capability, raw_capabilities};
use forge_core::{
    AnalysisKind, AnalysisRequest, Capability, DocumentationSource, ExtractionError,
    PipelineConfig,
};
use forge_llm::{with_timeout, CapabilitiesReady, ListenerChain, ModelProvider};
use std::collections::HashSet;
use std::sync::Arc;

/// Derives capabilities from service documentation.
#[derive(Clone)]
pub struct CapabilityExtractor {
    provider: Arc<dyn ModelProvider>,
    config: PipelineConfig,
    listeners: ListenerChain,
}

impl CapabilityExtractor {
    pub fn new(provider: Arc<dyn ModelProvider>, config: PipelineConfig) -> Self {
        Self {
            provider,
            config,
            listeners: ListenerChain::new(),
        }
    }

    pub fn with_listeners(mut self, listeners: ListenerChain) -> Self {
        self.listeners = listeners;
        self
    }

    /// Extract 1..=`max_capabilities` capabilities from `source`.
    ///
    /// Inline text beyond the configured budget is dropped before the request.
    pub async fn extract(
        &self,
        service_name: &str,
        source: DocumentationSource,
    ) -> Result<Vec<Capability>, ExtractionError> {
        let request = AnalysisRequest {
            service_name: service_name.to_string(),
            source: source.truncated(self.config.inline_text_budget),
        };

        let raw = with_timeout(
            "capability analysis",
            self.config.provider_timeout(),
            self.provider.analyze(AnalysisKind::Capabilities, &request),
        )
        .await
        .map_err(ExtractionError::Provider);

        let result = raw.and_then(|value| self.validate(value));
        match &result {
            Ok(capabilities) => {
                tracing::info!(
                    service = service_name,
                    capabilities = capabilities.len(),
                    "Capabilities extracted"
                );
                self.listeners
                    .emit_capabilities_ready(CapabilitiesReady {
                        service_name: service_name.to_string(),
                        capabilities: capabilities.clone(),
                    })
                    .await;
            }
            Err(e) => {
                tracing::warn!(service = service_name, error = %e, "Capability extraction failed");
            }
        }
        result
    }

    fn validate(&self, value: serde_json::Value) -> Result<Vec<Capability>, ExtractionError> {
        let raw = raw_capabilities(value)?;
        if raw.is_empty() {
            return Err(ExtractionError::Empty);
        }
        if raw.len() > self.config.max_capabilities {
            return Err(ExtractionError::TooMany {
                count: raw.len(),
                max: self.config.max_capabilities,
            });
        }

        let capabilities = raw
            .into_iter()
            .map(normalize_capability)
            .collect::<Result<Vec<_>, _>>()?;
        check_capabilities(&capabilities)?;
        Ok(capabilities)
    }
}

/// Every capability has at least one endpoint and a distinct id.
pub fn check_capabilities(capabilities: &[Capability]) -> Result<(), ExtractionError> {
    let mut seen = HashSet::new();
    for capability in capabilities {
        if capability.endpoints.is_empty() {
            return Err(ExtractionError::CapabilityWithoutEndpoints {
                capability_id: capability.id.clone(),
            });
        }
        if !seen.insert(capability.id.as_str()) {
            return Err(ExtractionError::DuplicateCapabilityId {
                id: capability.id.clone(),
            });
        }
    }
    Ok(())
}

impl std::fmt::Debug for CapabilityExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityExtractor")
            .field("provider", &self.provider.provider_id())
            .field("config", &self.config)
            .finish()
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use forge_test_utils::{assertions, generators::arb_capabilities, ScriptedProvider};
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any successful extraction satisfies the capability contract.
        #[test]
        fn prop_successful_extraction_is_valid(capabilities in arb_capabilities()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let provider = Arc::new(ScriptedProvider::new());
            provider.push_capabilities(Ok(json!({ "capabilities": capabilities })));
            let extractor = CapabilityExtractor::new(provider, PipelineConfig::default());

            let result = runtime.block_on(extractor.extract(
                "Service",
                DocumentationSource::Url("https://docs.example.com".to_string()),
            ));
            let extracted = result.unwrap();
            assertions::assert_valid_capabilities(&extracted);
            prop_assert_eq!(extracted.len(), capabilities.len());
        }
    }
}
