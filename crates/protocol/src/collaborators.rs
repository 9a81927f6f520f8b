use crate::file::FileRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoaderError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("content unavailable: {0}")]
    Unavailable(String),
}

/// Hydrates stub records (empty content) selected for inclusion.
#[async_trait]
pub trait FileContentLoader: Send + Sync {
    /// Returns records for the ids it could load; unknown ids are skipped.
    async fn load_content(&self, ids: &[String]) -> Result<Vec<FileRecord>, LoaderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryKind {
    Instruction,
    ToolResult,
    Question,
    Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: LogEntryKind,
    pub iteration: usize,
    pub content: String,
}

impl LogEntry {
    pub fn new(kind: LogEntryKind, iteration: usize, content: impl Into<String>) -> Self {
        Self {
            kind,
            iteration,
            content: content.into(),
        }
    }
}

/// Write-only observability channel for one execution.
#[async_trait]
pub trait ExecutionLogSink: Send + Sync {
    async fn append_message(&self, execution_id: &str, entry: LogEntry);
}
