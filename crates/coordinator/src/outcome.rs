use crate::action::{BreakReason, ClarifyOption};
use crate::failure::MutationFailure;
use crate::state::{EditRecord, LoopState};
use serde::{Deserialize, Serialize};
use theme_protocol::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The model finished on its own
    Completed,
    /// Waiting for the user to pick an option
    Clarifying,
    /// Ended by a policy break or a provider failure
    Stopped,
    Cancelled,
}

/// Terminal result of one execution. `message` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ClarifyOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_reason: Option<BreakReason>,
    pub edits: Vec<EditRecord>,
    pub failures: Vec<MutationFailure>,
    pub iterations: usize,
    pub tool_calls: usize,
    /// Conversation to resume from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatMessage>,
}

impl ExecutionOutcome {
    pub(crate) fn from_state(
        status: ExecutionStatus,
        message: String,
        fallback: String,
        state: LoopState,
    ) -> Self {
        let message = if message.trim().is_empty() {
            fallback
        } else {
            message
        };
        Self {
            status,
            message,
            options: Vec::new(),
            break_reason: None,
            edits: state.edits,
            failures: state.failures,
            iterations: state.iteration,
            tool_calls: state.tool_calls,
            history: state.history,
        }
    }

    #[must_use]
    pub(crate) fn with_options(mut self, options: Vec<ClarifyOption>) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub(crate) fn with_reason(mut self, reason: BreakReason) -> Self {
        self.break_reason = Some(reason);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}
