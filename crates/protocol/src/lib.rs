//! # Theme Protocol
//!
//! Shared vocabulary between the context assembly engine, the coordination
//! policy engine and their external collaborators.
//!
//! ```text
//! FileRecord ──> chunker / theme map / context engine
//!
//! ModelProvider ──complete_with_tools──> ToolCompletion ──> coordinator
//!                                                │
//! ToolExecutor <──────── ToolCall ───────────────┘
//!      │
//!      └──> raw JSON ──> ToolResult::normalize ──> history
//! ```
//!
//! The core never owns file bytes or transport details; it only depends on
//! the shapes defined here.

mod collaborators;
mod file;
mod hash;
mod message;
mod provider;
mod tool;

pub use collaborators::{ExecutionLogSink, FileContentLoader, LoaderError, LogEntry, LogEntryKind};
pub use file::{FileRecord, FileType};
pub use hash::content_hash;
pub use message::{ChatMessage, MessageTag, Role, ToolCall};
pub use provider::{
    CompletionOptions, CompletionResult, ModelProvider, ProviderError, StopReason, StreamEvent,
    ToolCompletion, ToolDefinition,
};
pub use tool::{ToolCatalog, ToolCategory, ToolError, ToolExecutor, ToolResult};
