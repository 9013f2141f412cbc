//! OpenAI-compatible provider implementation
//!
//! Works against any endpoint that speaks the Chat Completions protocol.

pub mod client;
pub mod provider;
pub mod types;

pub use client::OpenAIClient;
pub use provider::OpenAIProvider;
