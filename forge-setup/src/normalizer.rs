//! Schema normalization
//!
//! Pure conversion of the loosely-typed records a model returns into
//! canonical [`Capability`] and [`Endpoint`] values.

use forge_core::{
    Capability, Endpoint, ExtractionError, HttpMethod, ParamType, ParameterMap, ParameterSpec,
};
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// RAW RECORDS
// ============================================================================

/// Capability as emitted by the provider. Every field is optional here;
/// presence is checked during normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCapability {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<RawEndpoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEndpoint {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// List form: `[{name, type, description}]`
    #[serde(default)]
    pub parameter_list: Option<Vec<RawParameter>>,
    /// Map form: `{name: {type, description}}`
    #[serde(default)]
    pub parameters: Option<serde_json::Map<String, Value>>,
}

/// Parameter record. Non-string values read as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParameter {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default, rename = "type")]
    pub param_type: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
}

impl RawParameter {
    fn name(&self) -> Option<&str> {
        self.name
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    fn type_token(&self) -> Option<&str> {
        self.param_type.as_ref().and_then(Value::as_str)
    }

    fn description(&self) -> &str {
        self.description
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Read the capability list out of analysis output.
///
/// Accepts a bare array or an object wrapping it under `capabilities`.
pub fn raw_capabilities(value: Value) -> Result<Vec<RawCapability>, ExtractionError> {
    let list = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map.remove("capabilities").ok_or_else(|| {
            ExtractionError::Malformed {
                reason: "expected a `capabilities` array".to_string(),
            }
        })?,
        other => {
            return Err(ExtractionError::Malformed {
                reason: format!("expected an array, got {}", json_kind(&other)),
            })
        }
    };

    serde_json::from_value(list).map_err(|e| ExtractionError::Malformed {
        reason: e.to_string(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Map a raw type token to a canonical [`ParamType`].
///
/// `integer` becomes `number`; unknown or missing tokens become `string`.
pub fn coerce_param_type(raw: Option<&str>) -> ParamType {
    let Some(token) = raw else {
        return ParamType::String;
    };
    let token = token.trim().to_ascii_lowercase();
    match token.as_str() {
        "integer" => ParamType::Number,
        other => other.parse().unwrap_or(ParamType::String),
    }
}

/// Normalize a parameter list. Nameless entries are skipped; an empty result
/// is `None`.
pub fn normalize_parameter_list(list: &[RawParameter]) -> Option<ParameterMap> {
    let map: ParameterMap = list
        .iter()
        .filter_map(|raw| {
            let name = raw.name()?;
            Some((
                name.to_string(),
                ParameterSpec {
                    param_type: coerce_param_type(raw.type_token()),
                    description: raw.description().to_string(),
                },
            ))
        })
        .collect();
    (!map.is_empty()).then_some(map)
}

/// Normalize the `{name: {type, description}}` form.
pub fn normalize_parameter_map(map: &serde_json::Map<String, Value>) -> Option<ParameterMap> {
    let list: Vec<RawParameter> = map
        .iter()
        .map(|(name, spec)| RawParameter {
            name: Some(Value::String(name.clone())),
            param_type: spec.get("type").cloned(),
            description: spec.get("description").cloned(),
        })
        .collect();
    normalize_parameter_list(&list)
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn normalize_endpoint(raw: RawEndpoint) -> Result<Endpoint, ExtractionError> {
    let id = required(raw.id).ok_or_else(|| ExtractionError::Malformed {
        reason: "endpoint without id".to_string(),
    })?;

    let method: HttpMethod = raw
        .method
        .as_deref()
        .ok_or_else(|| ExtractionError::InvalidEndpoint {
            endpoint_id: id.clone(),
            reason: "missing method".to_string(),
        })?
        .parse()
        .map_err(|e: forge_core::EnumParseError| ExtractionError::InvalidEndpoint {
            endpoint_id: id.clone(),
            reason: e.to_string(),
        })?;

    let path = required(raw.path).ok_or_else(|| ExtractionError::InvalidEndpoint {
        endpoint_id: id.clone(),
        reason: "missing path".to_string(),
    })?;

    let parameters = match (&raw.parameter_list, &raw.parameters) {
        (Some(list), _) => normalize_parameter_list(list),
        (None, Some(map)) => normalize_parameter_map(map),
        (None, None) => None,
    };

    Ok(Endpoint {
        id,
        method,
        path,
        description: raw.description.unwrap_or_default(),
        parameters,
    })
}

/// Normalize one capability. A missing name falls back to the id.
pub fn normalize_capability(raw: RawCapability) -> Result<Capability, ExtractionError> {
    let id = required(raw.id).ok_or_else(|| ExtractionError::Malformed {
        reason: "capability without id".to_string(),
    })?;
    let endpoints = raw
        .endpoints
        .into_iter()
        .map(normalize_endpoint)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Capability {
        name: required(raw.name).unwrap_or_else(|| id.clone()),
        id,
        description: raw.description.unwrap_or_default(),
        endpoints,
    })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use forge_test_utils::generators::arb_raw_param_type;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Coercion is total: every raw token maps to a canonical type, and
        /// canonical tokens map to themselves.
        #[test]
        fn prop_coercion_is_total(token in arb_raw_param_type()) {
            let coerced = coerce_param_type(Some(&token));
            let lowered = token.to_ascii_lowercase();
            if lowered == "integer" {
                prop_assert_eq!(coerced, ParamType::Number);
            } else if let Ok(canonical) = lowered.parse::<ParamType>() {
                prop_assert_eq!(coerced, canonical);
            }
        }

        /// Normalized parameter maps are never empty.
        #[test]
        fn prop_parameter_map_never_empty(names in prop::collection::vec(prop::option::of("[a-z ]{0,6}"), 0..5)) {
            let list: Vec<RawParameter> = names
                .into_iter()
                .map(|name| RawParameter {
                    name: name.map(Value::String),
                    param_type: None,
                    description: None,
                })
                .collect();
            if let Some(map) = normalize_parameter_list(&list) {
                prop_assert!(!map.is_empty());
            }
        }
    }
}
