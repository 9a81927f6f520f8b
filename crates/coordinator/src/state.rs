use crate::failure::{MutationFailure, MutationFailureKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use theme_protocol::{ChatMessage, MessageTag, Role};

/// A successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRecord {
    pub path: String,
    pub tool: String,
    pub iteration: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NudgeCounters {
    pub completion: usize,
    pub premature_stop: usize,
    pub finalization: usize,
    /// Every nudge injected, whatever the policy
    pub total: usize,
}

/// Mutable record of one execution, owned by the driving loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopState {
    /// 1-based once the first iteration starts
    pub iteration: usize,
    pub tool_calls: usize,
    pub edits: Vec<EditRecord>,
    /// Reads per path
    pub reads: BTreeMap<String, usize>,
    /// Successful edits per path
    pub edit_log: BTreeMap<String, usize>,
    pub failures: Vec<MutationFailure>,
    /// Set once any mutation was attempted, successful or not
    pub edit_attempted: bool,
    pub edit_sla_breaches: usize,
    pub force_no_lookup_until_edit: bool,
    pub zero_tool_streak: usize,
    pub read_only_streak: usize,
    pub post_edit_stagnation: usize,
    pub stuck_recoveries: usize,
    pub rethinks: usize,
    pub nudges: NudgeCounters,
    pub history: Vec<ChatMessage>,
}

impl LoopState {
    pub fn new(history: Vec<ChatMessage>) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    pub fn has_edits(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Make sure the user's request is in the history and survives truncation.
    pub fn pin_request(&mut self, request: &str) {
        if request.trim().is_empty() {
            return;
        }
        let existing = self
            .history
            .iter_mut()
            .find(|m| m.role == Role::User && m.content == request);
        match existing {
            Some(message) if message.tag.is_none() => message.tag = Some(MessageTag::Context),
            Some(_) => {}
            None => self
                .history
                .push(ChatMessage::user(request).tagged(MessageTag::Context)),
        }
    }

    pub fn record_read(&mut self, path: &str) {
        *self.reads.entry(path.to_string()).or_default() += 1;
    }

    pub fn record_edit(&mut self, path: &str, tool: &str) {
        self.edit_attempted = true;
        self.force_no_lookup_until_edit = false;
        *self.edit_log.entry(path.to_string()).or_default() += 1;
        self.edits.push(EditRecord {
            path: path.to_string(),
            tool: tool.to_string(),
            iteration: self.iteration,
        });
        // A later success supersedes earlier failures on the same file
        self.failures.retain(|f| f.path != path);
    }

    pub fn record_failure(&mut self, path: &str, kind: MutationFailureKind) {
        self.edit_attempted = true;
        match self
            .failures
            .iter_mut()
            .find(|f| f.path == path && f.kind == kind)
        {
            Some(failure) => failure.attempts += 1,
            None => self.failures.push(MutationFailure {
                kind,
                path: path.to_string(),
                attempts: 1,
            }),
        }
    }

    /// Distinct edited paths in first-edit order.
    pub fn edited_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for edit in &self.edits {
            if !paths.contains(&edit.path.as_str()) {
                paths.push(edit.path.as_str());
            }
        }
        paths
    }
}

/// Partial `LoopState` update produced by a policy. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub edit_sla_breaches: Option<usize>,
    pub force_no_lookup_until_edit: Option<bool>,
    pub zero_tool_streak: Option<usize>,
    pub read_only_streak: Option<usize>,
    pub post_edit_stagnation: Option<usize>,
    pub stuck_recoveries: Option<usize>,
    pub rethinks: Option<usize>,
    pub completion_nudges: Option<usize>,
    pub premature_stop_nudges: Option<usize>,
    pub finalization_nudges: Option<usize>,
    pub replace_history: Option<Vec<ChatMessage>>,
    /// Clear the stuck detector window
    pub reset_detector: bool,
    /// Path the loop must read on the model's behalf
    pub forced_read: Option<String>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold `other` into `self`; fields set in `other` win.
    pub fn merge(&mut self, other: Self) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            edit_sla_breaches,
            force_no_lookup_until_edit,
            zero_tool_streak,
            read_only_streak,
            post_edit_stagnation,
            stuck_recoveries,
            rethinks,
            completion_nudges,
            premature_stop_nudges,
            finalization_nudges,
            replace_history,
            forced_read
        );
        self.reset_detector |= other.reset_detector;
    }

    /// Apply to the state. Detector resets and forced reads are left to the loop.
    pub fn apply(&self, state: &mut LoopState) {
        macro_rules! set {
            ($($field:ident => $target:expr),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    $target = value;
                })*
            };
        }
        set!(
            edit_sla_breaches => state.edit_sla_breaches,
            force_no_lookup_until_edit => state.force_no_lookup_until_edit,
            zero_tool_streak => state.zero_tool_streak,
            read_only_streak => state.read_only_streak,
            post_edit_stagnation => state.post_edit_stagnation,
            stuck_recoveries => state.stuck_recoveries,
            rethinks => state.rethinks,
            completion_nudges => state.nudges.completion,
            premature_stop_nudges => state.nudges.premature_stop,
            finalization_nudges => state.nudges.finalization,
        );
        if let Some(history) = &self.replace_history {
            state.history = history.clone();
        }
    }
}

fn is_pinned(message: &ChatMessage) -> bool {
    message.role == Role::System
        || message.has_tag(MessageTag::Context)
        || message.has_tag(MessageTag::MemoryAnchor)
}

/// Keep system, context and memory-anchor messages plus the last `keep_last`
/// other messages, in original order.
///
/// The tail never starts with a tool result whose call was cut off.
pub fn truncate_history(history: &[ChatMessage], keep_last: usize) -> Vec<ChatMessage> {
    let unpinned: Vec<usize> = history
        .iter()
        .enumerate()
        .filter(|(_, m)| !is_pinned(m))
        .map(|(idx, _)| idx)
        .collect();
    let mut tail: &[usize] = &unpinned[unpinned.len().saturating_sub(keep_last)..];
    while let Some((first, rest)) = tail.split_first() {
        if history[*first].role == Role::Tool {
            tail = rest;
        } else {
            break;
        }
    }

    history
        .iter()
        .enumerate()
        .filter(|(idx, m)| is_pinned(m) || tail.contains(idx))
        .map(|(_, m)| m.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use theme_protocol::ToolCall;

    #[test]
    fn test_truncation_keeps_pinned_and_tail() {
        let history = vec![
            ChatMessage::system("system"),
            ChatMessage::user("context").tagged(MessageTag::Context),
            ChatMessage::user("request"),
            ChatMessage::assistant("", vec![ToolCall::new("1", "read_file", serde_json::json!({}))]),
            ChatMessage::tool_result("1", "file body"),
            ChatMessage::user("anchor").tagged(MessageTag::MemoryAnchor),
            ChatMessage::assistant("thinking", Vec::new()),
        ];
        let kept: Vec<String> = truncate_history(&history, 2)
            .into_iter()
            .map(|m| m.content)
            .collect();
        // The orphaned tool result is dropped with its call
        assert_eq!(kept, vec!["system", "context", "anchor", "thinking"]);
        assert_eq!(truncate_history(&history, 10).len(), history.len());
    }

    #[test]
    fn test_pinned_request_survives_truncation() {
        let mut state = LoopState::new(vec![ChatMessage::system("system")]);
        state.pin_request("make the logo bigger");
        for i in 0..4 {
            let id = i.to_string();
            state.history.push(ChatMessage::assistant(
                "",
                vec![ToolCall::new(id.clone(), "read_file", serde_json::json!({}))],
            ));
            state.history.push(ChatMessage::tool_result(id, "body"));
        }
        let kept = truncate_history(&state.history, 6);
        assert_eq!(kept[1].content, "make the logo bigger");
        assert_eq!(kept.len(), 8);

        // A request already supplied by the caller is tagged, not duplicated
        let mut state = LoopState::new(vec![ChatMessage::user("make the logo bigger")]);
        state.pin_request("make the logo bigger");
        assert_eq!(state.history.len(), 1);
        assert!(state.history[0].has_tag(MessageTag::Context));
    }

    #[test]
    fn test_delta_merge_and_apply() {
        let mut delta = StateDelta {
            read_only_streak: Some(1),
            ..StateDelta::default()
        };
        delta.merge(StateDelta {
            read_only_streak: Some(0),
            rethinks: Some(2),
            reset_detector: true,
            ..StateDelta::default()
        });
        let mut state = LoopState {
            read_only_streak: 5,
            zero_tool_streak: 3,
            ..LoopState::default()
        };
        delta.apply(&mut state);
        assert_eq!(state.read_only_streak, 0);
        assert_eq!(state.rethinks, 2);
        assert_eq!(state.zero_tool_streak, 3);
        assert!(delta.reset_detector);
    }

    #[test]
    fn test_failures_accumulate_until_success() {
        let mut state = LoopState::default();
        state.record_failure("a.liquid", MutationFailureKind::OldTextNotFound);
        state.record_failure("a.liquid", MutationFailureKind::OldTextNotFound);
        assert_eq!(state.failures[0].attempts, 2);
        assert!(!state.has_edits());
        assert!(state.edit_attempted);

        state.record_edit("a.liquid", "edit_file");
        assert!(state.failures.is_empty());
        assert_eq!(state.edited_paths(), vec!["a.liquid"]);
    }
}
