//! Model provider implementations
//!
//! Concrete [`ModelProvider`](crate::ModelProvider) implementations.

pub mod openai;

pub use openai::{OpenAIClient, OpenAIProvider};

use forge_core::LlmError;

pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> LlmError {
    LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    }
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> LlmError {
    LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    }
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> LlmError {
    LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    }
}
