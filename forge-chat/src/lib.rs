//! FORGE Chat - Tool-Dispatch Engine
//!
//! Per-project chat turns: windowed history and the project's tool
//! declarations go to the model provider, and every call it requests comes
//! back attributed to a declared tool or marked unresolved. Outcomes are
//! applied by the registry, which drops turns for projects that are no
//! longer active.

pub mod engine;
pub mod service;
pub mod welcome;

pub use engine::{
    history_window, resolve_call, DispatchEngine, TurnState, EMPTY_REPLY_TEXT, FAILURE_TEXT,
    SYSTEM_INSTRUCTION,
};
pub use service::{ChatService, SentTurn};
pub use welcome::{welcome_message, welcome_text, NO_INTEGRATIONS_WELCOME};
