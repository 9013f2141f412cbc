//! Error types for FORGE operations

use crate::{IntegrationId, ProjectId};
use thiserror::Error;

/// LLM provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No LLM provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
}

/// Validation errors raised at the data-entry boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate {entity} id: {id}")]
    DuplicateId { entity: &'static str, id: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or FORGE_CONFIG)")]
    MissingConfigPath,

    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },
}

/// Registry and snapshot errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Integration not found: {id}")]
    IntegrationNotFound { id: IntegrationId },

    #[error("Project not found: {id}")]
    ProjectNotFound { id: ProjectId },

    #[error("Integration already registered: {id}")]
    DuplicateIntegration { id: IntegrationId },

    #[error("Snapshot I/O failed: {reason}")]
    Io { reason: String },

    #[error("Snapshot serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Capability extraction failures. None of these leave partial state behind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Provider failed during capability analysis: {0}")]
    Provider(LlmError),

    #[error("Malformed capability output: {reason}")]
    Malformed { reason: String },

    #[error("Provider returned no capabilities")]
    Empty,

    #[error("Provider returned {count} capabilities, at most {max} are allowed")]
    TooMany { count: usize, max: usize },

    #[error("Capability {capability_id} has no endpoints")]
    CapabilityWithoutEndpoints { capability_id: String },

    #[error("Capability id {id} appears more than once")]
    DuplicateCapabilityId { id: String },

    #[error("Endpoint {endpoint_id} is invalid: {reason}")]
    InvalidEndpoint { endpoint_id: String, reason: String },
}

/// Errors that reject a chat turn before it reaches the provider.
///
/// Provider failures during a turn are not errors: they render a fallback
/// message instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Message is empty")]
    EmptyInput,

    #[error("A turn is already in flight for project {project_id}")]
    TurnInFlight { project_id: ProjectId },
}

/// Integration setup flow errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("Service name is empty")]
    MissingServiceName,

    #[error("No documentation source has been provided")]
    MissingDocumentation,

    #[error("Setup is at step {actual}, expected {expected}")]
    WrongStep {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("No capabilities selected")]
    NothingSelected,

    #[error("Unknown capability: {id}")]
    UnknownCapability { id: String },

    #[error("Auth inference is still running")]
    AuthPending,

    #[error("Auth inference already produced a usable config")]
    AuthRetryNotAllowed,

    #[error("Required credential {key} is empty")]
    MissingCredential { key: String },

    #[error("{key} is not a credential of this service")]
    UnknownCredential { key: String },

    #[error("Capability extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Integration record rejected: {0}")]
    Invalid(#[from] ValidationError),
}

/// Master error type for all FORGE errors.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),
}

/// Result type alias for FORGE operations.
pub type ForgeResult<T> = Result<T, ForgeError>;
