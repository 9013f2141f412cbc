//! Tool declaration synthesis
//!
//! Turns endpoints into dispatch-ready declarations. Names are
//! `{integration}_{endpoint}` after sanitizing, with a hash suffix whenever
//! that would collide or exceed the provider's 64 character limit.

use forge_core::{
    Capability, Endpoint, Integration, IntegrationId, ParamType, ParameterMap, ParameterSpec,
    ToolBinding, ToolDeclaration,
};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Longest tool name accepted by function-calling APIs.
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Parameter declared for endpoints that have none.
pub const FALLBACK_PARAM: &str = "note";
pub const FALLBACK_PARAM_DESCRIPTION: &str = "Any additional details needed for this request";

const HASH_LEN: usize = 8;

/// Lower-case and replace everything outside `[a-z0-9]` with `_`.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Flatten endpoints across capabilities, keeping the first occurrence of
/// each id.
pub fn dedup_endpoints<'a, I>(capabilities: I) -> Vec<Endpoint>
where
    I: IntoIterator<Item = &'a Capability>,
{
    let mut seen = HashSet::new();
    let mut endpoints = Vec::new();
    for capability in capabilities {
        for endpoint in &capability.endpoints {
            if seen.insert(endpoint.id.clone()) {
                endpoints.push(endpoint.clone());
            } else {
                tracing::debug!(
                    capability = %capability.id,
                    endpoint = %endpoint.id,
                    "Endpoint already provided by an earlier capability"
                );
            }
        }
    }
    endpoints
}

fn fallback_parameters() -> ParameterMap {
    let mut map = ParameterMap::new();
    map.insert(
        FALLBACK_PARAM.to_string(),
        ParameterSpec {
            param_type: ParamType::String,
            description: FALLBACK_PARAM_DESCRIPTION.to_string(),
        },
    );
    map
}

fn short_hash(integration_key: &str, endpoint_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(integration_key.as_bytes());
    hasher.update([0u8]);
    hasher.update(endpoint_id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..HASH_LEN].to_string()
}

/// `base` cut to leave room for `suffix`, then joined with `_`.
/// `base` is ASCII after sanitizing, so byte slicing is safe.
fn with_suffix(base: &str, suffix: &str) -> String {
    let keep = MAX_TOOL_NAME_LEN.saturating_sub(suffix.len() + 1);
    format!("{}_{}", &base[..base.len().min(keep)], suffix)
}

// ============================================================================
// TOOL SET
// ============================================================================

/// Declarations for one conversation plus the name lookup used to resolve
/// calls.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    declarations: Vec<ToolDeclaration>,
    by_name: HashMap<String, usize>,
}

impl ToolSet {
    pub fn declarations(&self) -> &[ToolDeclaration] {
        &self.declarations
    }

    pub fn into_declarations(self) -> Vec<ToolDeclaration> {
        self.declarations
    }

    pub fn get(&self, name: &str) -> Option<&ToolDeclaration> {
        self.by_name.get(name).map(|&idx| &self.declarations[idx])
    }

    pub fn resolve(&self, name: &str) -> Option<&ToolBinding> {
        self.get(name).map(|d| &d.binding)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

/// Accumulates declarations across integrations with names unique over the
/// whole set.
#[derive(Debug, Default)]
pub struct ToolSetBuilder {
    taken: HashSet<String>,
    set: ToolSet,
}

impl ToolSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every endpoint of a finalized integration.
    pub fn add_integration(&mut self, integration: &Integration) -> &mut Self {
        let key = integration.id.to_string();
        for endpoint in &integration.endpoints {
            self.push(Some(integration.id), &integration.name, &key, endpoint);
        }
        self
    }

    /// Add endpoints of an integration that has no id yet.
    pub fn add_endpoints(&mut self, integration_name: &str, endpoints: &[Endpoint]) -> &mut Self {
        let key = sanitize(integration_name);
        for endpoint in endpoints {
            self.push(None, integration_name, &key, endpoint);
        }
        self
    }

    pub fn build(self) -> ToolSet {
        self.set
    }

    fn push(
        &mut self,
        integration_id: Option<IntegrationId>,
        integration_name: &str,
        integration_key: &str,
        endpoint: &Endpoint,
    ) {
        let name = self.claim_name(integration_name, integration_key, &endpoint.id);
        let declaration = ToolDeclaration {
            description: format!(
                "{} (Integration: {}, Endpoint: {} {})",
                endpoint.description, integration_name, endpoint.method, endpoint.path
            ),
            parameters: endpoint
                .parameters
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(fallback_parameters),
            binding: ToolBinding {
                integration_id,
                integration_name: integration_name.to_string(),
                endpoint_id: endpoint.id.clone(),
                method: endpoint.method,
                path: endpoint.path.clone(),
            },
            name: name.clone(),
        };
        self.set.by_name.insert(name, self.set.declarations.len());
        self.set.declarations.push(declaration);
    }

    fn claim_name(
        &mut self,
        integration_name: &str,
        integration_key: &str,
        endpoint_id: &str,
    ) -> String {
        let candidate = format!("{}_{}", sanitize(integration_name), sanitize(endpoint_id));
        if candidate.len() <= MAX_TOOL_NAME_LEN && !self.taken.contains(&candidate) {
            self.taken.insert(candidate.clone());
            return candidate;
        }

        let hashed = with_suffix(&candidate, &short_hash(integration_key, endpoint_id));
        if !self.taken.contains(&hashed) {
            self.taken.insert(hashed.clone());
            return hashed;
        }

        let mut counter = 2usize;
        loop {
            let numbered = with_suffix(&hashed, &counter.to_string());
            if self.taken.insert(numbered.clone()) {
                return numbered;
            }
            counter += 1;
        }
    }
}

/// Declarations for the selected capabilities of one integration under setup.
pub fn synthesize<'a, I>(integration_name: &str, capabilities: I) -> Vec<ToolDeclaration>
where
    I: IntoIterator<Item = &'a Capability>,
{
    let endpoints = dedup_endpoints(capabilities);
    let mut builder = ToolSetBuilder::new();
    builder.add_endpoints(integration_name, &endpoints);
    builder.build().into_declarations()
}

/// Project-wide tool set over the given integrations.
pub fn tool_set_for<'a, I>(integrations: I) -> ToolSet
where
    I: IntoIterator<Item = &'a Integration>,
{
    let mut builder = ToolSetBuilder::new();
    for integration in integrations {
        builder.add_integration(integration);
    }
    builder.build()
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use forge_test_utils::assertions::assert_unique_tool_names;
    use forge_test_utils::generators::{arb_capabilities, arb_service_name};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// One declaration per distinct endpoint id, matching its first occurrence.
        #[test]
        fn prop_one_declaration_per_distinct_endpoint(capabilities in arb_capabilities()) {
            let declarations = synthesize("Service", &capabilities);

            let mut first_seen: Vec<&Endpoint> = Vec::new();
            for cap in &capabilities {
                for ep in &cap.endpoints {
                    if !first_seen.iter().any(|e| e.id == ep.id) {
                        first_seen.push(ep);
                    }
                }
            }

            prop_assert_eq!(declarations.len(), first_seen.len());
            for (declaration, endpoint) in declarations.iter().zip(first_seen) {
                prop_assert_eq!(&declaration.binding.endpoint_id, &endpoint.id);
                prop_assert_eq!(&declaration.binding.path, &endpoint.path);
                prop_assert!(!declaration.parameters.is_empty());
            }
        }

        /// Names are unique and bounded across several integrations.
        #[test]
        fn prop_names_unique_project_wide(
            names in prop::collection::vec(arb_service_name(), 1..4),
            capabilities in arb_capabilities(),
        ) {
            let endpoints = dedup_endpoints(&capabilities);
            let mut builder = ToolSetBuilder::new();
            for name in &names {
                builder.add_endpoints(name, &endpoints);
            }
            let set = builder.build();
            assert_unique_tool_names(set.declarations());
            for declaration in set.declarations() {
                prop_assert!(set.get(&declaration.name).is_some());
            }
        }
    }
}
