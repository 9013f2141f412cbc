//! Enum types for FORGE entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing one of the closed FORGE enums from its string key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl EnumParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ============================================================================
// ENDPOINT ENUMS
// ============================================================================

/// HTTP method of a documented endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = EnumParseError;

    /// Case-insensitive; providers are not consistent about casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            _ => Err(EnumParseError::new("http method", s)),
        }
    }
}

/// Canonical primitive type of an endpoint parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = EnumParseError;

    /// Strict parse of a canonical token. Lenient coercion of provider output
    /// lives in the setup normalizer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            _ => Err(EnumParseError::new("parameter type", s)),
        }
    }
}

// ============================================================================
// AUTH ENUMS
// ============================================================================

/// Authentication scheme inferred for an external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AuthType {
    #[serde(rename = "apiKey")]
    ApiKey,
    #[serde(rename = "oauth2")]
    OAuth2,
    #[serde(rename = "basic")]
    Basic,
    #[default]
    #[serde(rename = "custom")]
    Custom,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "apiKey",
            Self::OAuth2 => "oauth2",
            Self::Basic => "basic",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input kind of a credential field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthFieldType {
    Text,
    Password,
    Url,
}

impl AuthFieldType {
    /// Whether the value must be masked when displayed or logged.
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Password)
    }
}

// ============================================================================
// RECORD STATUS ENUMS
// ============================================================================

/// Connection status of a finalized integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Connected,
    Error,
    Pending,
}

/// Author role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PROJECT ICON
// ============================================================================

/// Closed set of project icons.
///
/// Unknown keys are rejected when parsed, so a render path can match
/// exhaustively instead of falling back to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectIcon {
    #[default]
    Folder,
    Terminal,
    Cpu,
    Layers,
    Globe,
    Database,
    Briefcase,
}

impl ProjectIcon {
    /// Every icon, in picker order.
    pub const ALL: [ProjectIcon; 7] = [
        Self::Folder,
        Self::Terminal,
        Self::Cpu,
        Self::Layers,
        Self::Globe,
        Self::Database,
        Self::Briefcase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Terminal => "terminal",
            Self::Cpu => "cpu",
            Self::Layers => "layers",
            Self::Globe => "globe",
            Self::Database => "database",
            Self::Briefcase => "briefcase",
        }
    }

    /// Single-glyph rendering used by text frontends.
    pub fn glyph(&self) -> char {
        match self {
            Self::Folder => '▣',
            Self::Terminal => '▶',
            Self::Cpu => '◆',
            Self::Layers => '≡',
            Self::Globe => '◎',
            Self::Database => '◫',
            Self::Briefcase => '◧',
        }
    }
}

impl fmt::Display for ProjectIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectIcon {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|icon| icon.as_str() == s)
            .ok_or_else(|| EnumParseError::new("project icon", s))
    }
}
