use crate::state::StateDelta;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One answer the user can pick when the loop stops to ask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyOption {
    pub label: String,
    pub description: String,
    #[serde(default)]
    pub recommended: bool,
}

impl ClarifyOption {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
            recommended: false,
        }
    }

    #[must_use]
    pub fn recommended(mut self) -> Self {
        self.recommended = true;
        self
    }
}

/// Why an execution ended early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum BreakReason {
    StuckRecoveryExhausted,
    RethinkBudgetExhausted,
    ToolCallHardCap,
    IterationLimit,
    ProviderFailure(String),
    Cancelled,
}

impl fmt::Display for BreakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StuckRecoveryExhausted => f.write_str("stuck recovery budget exhausted"),
            Self::RethinkBudgetExhausted => f.write_str("rethink budget exhausted"),
            Self::ToolCallHardCap => f.write_str("tool call hard cap reached"),
            Self::IterationLimit => f.write_str("iteration limit reached"),
            Self::ProviderFailure(err) => write!(f, "model request failed: {err}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// What the driving loop should do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PolicyAction {
    Continue,
    Break {
        reason: BreakReason,
        message: String,
    },
    Nudge {
        message: String,
    },
    Clarify {
        message: String,
        options: Vec<ClarifyOption>,
    },
    BlockLookup {
        reason: String,
    },
}

impl PolicyAction {
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Break { .. } => "break",
            Self::Nudge { .. } => "nudge",
            Self::Clarify { .. } => "clarify",
            Self::BlockLookup { .. } => "block_lookup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    EditSla,
    StuckDetection,
    ZeroToolForced,
    CompletionValidator,
    ConfirmationGate,
    PrematureStop,
    ReadOnlyStagnation,
    PostEditStagnation,
    FinalizationNudge,
    LookupGate,
}

impl PolicyKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EditSla => "edit_sla",
            Self::StuckDetection => "stuck_detection",
            Self::ZeroToolForced => "zero_tool_forced",
            Self::CompletionValidator => "completion_validator",
            Self::ConfirmationGate => "confirmation_gate",
            Self::PrematureStop => "premature_stop",
            Self::ReadOnlyStagnation => "read_only_stagnation",
            Self::PostEditStagnation => "post_edit_stagnation",
            Self::FinalizationNudge => "finalization_nudge",
            Self::LookupGate => "lookup_gate",
        }
    }
}

/// Loop phase at which a group of policies is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckPoint {
    PreIteration,
    PostResponse,
    PostToolDispatch,
}

impl CheckPoint {
    /// Policies of this check point in priority order.
    pub const fn policies(self) -> &'static [PolicyKind] {
        match self {
            Self::PreIteration => &[
                PolicyKind::EditSla,
                PolicyKind::StuckDetection,
                PolicyKind::FinalizationNudge,
            ],
            Self::PostResponse => &[
                PolicyKind::ZeroToolForced,
                PolicyKind::CompletionValidator,
                PolicyKind::ConfirmationGate,
                PolicyKind::PrematureStop,
            ],
            Self::PostToolDispatch => &[
                PolicyKind::ReadOnlyStagnation,
                PolicyKind::PostEditStagnation,
            ],
        }
    }
}

/// A policy verdict together with the counter updates it wants applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub policy: Option<PolicyKind>,
    pub action: PolicyAction,
    pub delta: StateDelta,
}

impl Decision {
    pub fn proceed() -> Self {
        Self {
            policy: None,
            action: PolicyAction::Continue,
            delta: StateDelta::default(),
        }
    }

    pub fn new(policy: PolicyKind, action: PolicyAction) -> Self {
        Self {
            policy: Some(policy),
            action,
            delta: StateDelta::default(),
        }
    }

    /// `Continue` that only carries counter updates.
    pub fn update(policy: PolicyKind, delta: StateDelta) -> Self {
        Self {
            policy: Some(policy),
            action: PolicyAction::Continue,
            delta,
        }
    }

    #[must_use]
    pub fn with_delta(mut self, delta: StateDelta) -> Self {
        self.delta = delta;
        self
    }
}
