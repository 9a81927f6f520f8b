//! Abstract model provider contract.
//!
//! Concrete HTTP clients live outside the core; the coordinator only relies on
//! the request/response shapes below.

use crate::message::{ChatMessage, ToolCall};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    /// Output was cut by the token limit
    MaxTokens,
    StopSequence,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub content: String,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCompletion {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
}

/// Incremental events of a streamed completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    TextDelta { text: String },
    ToolStart { id: String, name: String },
    ToolDelta { id: String, partial_json: String },
    ToolEnd { id: String },
}

/// Failures at the request boundary. Retried by the caller, never by policies.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether the caller may retry the same request.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout | Self::Network(_)
        )
    }
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionResult, ProviderError>;

    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &CompletionOptions,
    ) -> Result<ToolCompletion, ProviderError>;

    /// Stream a plain completion. Providers without native streaming emit the
    /// whole answer as one delta.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<CompletionResult, ProviderError> {
        let result = self.complete(messages, options).await?;
        let _ = events
            .send(StreamEvent::TextDelta {
                text: result.content.clone(),
            })
            .await;
        Ok(result)
    }

    async fn stream_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &CompletionOptions,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<ToolCompletion, ProviderError> {
        let result = self.complete_with_tools(messages, tools, options).await?;
        if !result.content.is_empty() {
            let _ = events
                .send(StreamEvent::TextDelta {
                    text: result.content.clone(),
                })
                .await;
        }
        for call in &result.tool_calls {
            let _ = events
                .send(StreamEvent::ToolStart {
                    id: call.id.clone(),
                    name: call.name.clone(),
                })
                .await;
            let _ = events
                .send(StreamEvent::ToolDelta {
                    id: call.id.clone(),
                    partial_json: call.input.to_string(),
                })
                .await;
            let _ = events
                .send(StreamEvent::ToolEnd {
                    id: call.id.clone(),
                })
                .await;
        }
        Ok(result)
    }
}
