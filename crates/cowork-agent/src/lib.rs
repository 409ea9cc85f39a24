//! Agent orchestration core.
//!
//! Turns free-form model output into executable actions: fenced `tool:` blocks are repaired
//! and parsed, dispatched through a tool registry, optionally sequenced by a numbered
//! `plan` block, and gated by file-defined skills with their own permission rules.

pub mod artifacts;
mod dispatch;
pub mod error;
pub mod llm;
pub mod parser;
pub mod plan;
pub mod prompt;
pub mod runtime;
pub mod session;
pub mod skills;
#[cfg(test)]
mod test_support;
pub mod tools;
pub mod types;

pub use session::{Session, SubmitOutcome, TurnReport};
pub use types::{AgentConfig, ChatMessage, EventSink, Role, ToolCall, ToolResult};
