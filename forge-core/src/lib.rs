//! FORGE Core - Entity Types
//!
//! Pure data structures for the capability extraction and tool-dispatch
//! pipeline. All other crates depend on this. No I/O beyond config loading.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod llm;
pub mod turn;

pub use config::{
    ForgeConfig, LoggingSettings, PipelineConfig, ProviderSettings, StorageSettings,
    DEFAULT_HISTORY_WINDOW, DEFAULT_INLINE_TEXT_BUDGET, DEFAULT_PROVIDER_TIMEOUT_MS,
    MAX_CAPABILITIES,
};
pub use entities::{
    AuthConfig, AuthField, Capability, Endpoint, Integration, Message, ParameterMap,
    ParameterSpec, Project, ToolCallRecord, ToolResolution,
};
pub use enums::{
    AuthFieldType, AuthType, EnumParseError, HttpMethod, IntegrationStatus, MessageRole,
    ParamType, ProjectIcon,
};
pub use error::{
    ConfigError, DispatchError, ExtractionError, ForgeError, ForgeResult, LlmError, SetupError,
    StorageError, ValidationError,
};
pub use identity::{
    new_entity_id, now, EntityId, IntegrationId, MessageId, ProjectId, Timestamp,
};
pub use llm::{
    truncate_chars, AnalysisKind, AnalysisRequest, AuthOutcome, ChatTurn, ConverseReply,
    ConverseRequest, DocsHint, DocumentationSource, ToolBinding, ToolCallRequest,
    ToolDeclaration,
};
pub use turn::{TurnContext, TurnOutcome, TurnStatus};

impl From<EnumParseError> for ValidationError {
    fn from(err: EnumParseError) -> Self {
        ValidationError::InvalidValue {
            field: err.kind.to_string(),
            reason: format!("unknown key {:?}", err.value),
        }
    }
}
