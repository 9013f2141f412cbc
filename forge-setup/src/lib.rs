//! FORGE Setup - Integration Pipeline
//!
//! Turns a service name plus documentation into a connected integration:
//! documentation discovery, capability extraction and normalization,
//! background auth inference, and synthesis of the tool declarations a
//! conversation exposes.

pub mod auth;
pub mod extractor;
pub mod normalizer;
pub mod session;
pub mod synthesizer;

pub use auth::{parse_auth_config, AuthInferencer, AuthStatus, AuthTask};
pub use extractor::{check_capabilities, CapabilityExtractor};
pub use normalizer::{coerce_param_type, normalize_capability, normalize_endpoint};
pub use session::{DiscoveryOutcome, SetupSession, SetupStep};
pub use synthesizer::{
    dedup_endpoints, sanitize, synthesize, tool_set_for, ToolSet, ToolSetBuilder,
    FALLBACK_PARAM, MAX_TOOL_NAME_LEN,
};
