//! The coordination policies.
//!
//! Each policy is a pure function of the loop state, the execution context
//! and, after a model response or a tool dispatch, a snapshot of that
//! iteration. Counter updates travel in the returned [`StateDelta`].

use crate::action::{BreakReason, ClarifyOption, Decision, PolicyAction, PolicyKind};
use crate::context::CoordinatorContext;
use crate::state::{truncate_history, LoopState, StateDelta};
use std::collections::BTreeSet;
use theme_protocol::{FileType, StopReason, ToolCall, ToolCatalog, ToolCategory, ToolCompletion};

const EDIT_SLA_NUDGE: &str = "You have used many tools without changing anything. \
Stop exploring. Make the edit now with the information you already have. \
Further lookups are disabled until a file is changed.";

const STUCK_RECOVERY_NUDGE: &str = "You are repeating the same action without progress. \
The conversation was trimmed to the essentials. Take a different approach: \
re-read the target file once, then apply a minimal edit.";

const FORCED_READ_NUDGE: &str = "You answered without using any tool. \
The target file was read for you below. Edit it now.";

const PREMATURE_STOP_NUDGE: &str = "No file has been changed yet. Do not explain, summarize \
or ask for permission. Call an edit tool now to make the requested change.";

const READ_ONLY_NUDGE: &str = "You have only been reading for several iterations. \
You have enough context. Edit the file now; further reads and lookups are disabled \
until you do.";

const RETHINK_NUDGE: &str = "Your recent attempts produced no new change. Before the next \
tool call, critique your approach:\n\
1. Which edits failed and why?\n\
2. Is the text you are replacing exactly what the file contains now?\n\
3. Is this the right file at all?\n\
Then make one precise edit.";

const FINALIZATION_NUDGE: &str = "You have made your edits and used many tool calls. \
Finish now: verify nothing else is required and stop calling tools.";

/// What happened in the iteration being evaluated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationSnapshot {
    /// Calls requested by the model this iteration
    pub tool_calls: Vec<ToolCall>,
    /// Category of each call, same order
    pub categories: Vec<ToolCategory>,
    pub stop_reason: Option<StopReason>,
    pub content: String,
    /// Successful edits produced by this iteration's dispatch
    pub new_edits: usize,
}

impl IterationSnapshot {
    pub fn from_completion(completion: &ToolCompletion, catalog: &ToolCatalog) -> Self {
        Self {
            categories: completion
                .tool_calls
                .iter()
                .map(|call| catalog.category(&call.name))
                .collect(),
            tool_calls: completion.tool_calls.clone(),
            stop_reason: Some(completion.stop_reason),
            content: completion.content.clone(),
            new_edits: 0,
        }
    }

    #[must_use]
    pub fn with_new_edits(mut self, new_edits: usize) -> Self {
        self.new_edits = new_edits;
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    fn hit_length_limit(&self) -> bool {
        self.stop_reason == Some(StopReason::MaxTokens)
    }
}

impl PolicyKind {
    /// Evaluate this policy. Post-response and post-dispatch policies continue
    /// when no snapshot is given.
    pub fn evaluate(
        self,
        state: &LoopState,
        ctx: &CoordinatorContext,
        snapshot: Option<&IterationSnapshot>,
    ) -> Decision {
        match (self, snapshot) {
            (Self::EditSla, _) => edit_sla(state, ctx),
            (Self::StuckDetection, _) => stuck_detection(state, ctx),
            (Self::FinalizationNudge, _) => finalization_nudge(state, ctx),
            (Self::ZeroToolForced, Some(snap)) => zero_tool_forced(state, ctx, snap),
            (Self::CompletionValidator, Some(snap)) => completion_validator(state, ctx, snap),
            (Self::ConfirmationGate, Some(snap)) => confirmation_gate(ctx, snap),
            (Self::PrematureStop, Some(snap)) => premature_stop(state, ctx, snap),
            (Self::ReadOnlyStagnation, Some(snap)) => read_only_stagnation(state, ctx, snap),
            (Self::PostEditStagnation, Some(snap)) => post_edit_stagnation(state, ctx, snap),
            _ => Decision::proceed(),
        }
    }
}

fn budget_remains(state: &LoopState, ctx: &CoordinatorContext) -> bool {
    state.iteration < ctx.thresholds.max_iterations
}

pub fn edit_sla(state: &LoopState, ctx: &CoordinatorContext) -> Decision {
    let limits = &ctx.thresholds;
    if !ctx.is_code() || state.has_edits() {
        return Decision::proceed();
    }

    match state.edit_sla_breaches {
        0 if state.tool_calls >= limits.edit_sla_tool_calls => Decision::new(
            PolicyKind::EditSla,
            PolicyAction::Nudge {
                message: EDIT_SLA_NUDGE.to_string(),
            },
        )
        .with_delta(StateDelta {
            edit_sla_breaches: Some(1),
            force_no_lookup_until_edit: Some(true),
            ..StateDelta::default()
        }),
        1 if state.tool_calls >= limits.edit_sla_abort_tool_calls => Decision::new(
            PolicyKind::EditSla,
            PolicyAction::Clarify {
                message: format!(
                    "I made {} tool calls without finding what to change. How should I proceed?",
                    state.tool_calls
                ),
                options: vec![
                    ClarifyOption::new(
                        "Point me to the file",
                        "Name the file or section that should change",
                    )
                    .recommended(),
                    ClarifyOption::new(
                        "Describe the change differently",
                        "Rephrase the request with the exact element or setting",
                    ),
                    ClarifyOption::new("Keep exploring", "Allow more lookups before editing"),
                ],
            },
        )
        .with_delta(StateDelta {
            edit_sla_breaches: Some(2),
            ..StateDelta::default()
        }),
        _ => Decision::proceed(),
    }
}

pub fn stuck_detection(state: &LoopState, ctx: &CoordinatorContext) -> Decision {
    let Some(report) = ctx.detector.report() else {
        return Decision::proceed();
    };
    let limits = &ctx.thresholds;

    if state.stuck_recoveries >= limits.max_stuck_recoveries {
        return Decision::new(
            PolicyKind::StuckDetection,
            PolicyAction::Break {
                reason: BreakReason::StuckRecoveryExhausted,
                message: format!(
                    "Stopped after {} recovery attempts: {}. {}",
                    state.stuck_recoveries,
                    report.pattern,
                    progress_summary(state)
                ),
            },
        );
    }

    Decision::new(
        PolicyKind::StuckDetection,
        PolicyAction::Nudge {
            message: format!("{STUCK_RECOVERY_NUDGE}\nDetected: {}.", report.pattern),
        },
    )
    .with_delta(StateDelta {
        stuck_recoveries: Some(state.stuck_recoveries + 1),
        zero_tool_streak: Some(0),
        read_only_streak: Some(0),
        post_edit_stagnation: Some(0),
        replace_history: Some(truncate_history(&state.history, limits.history_keep_last)),
        reset_detector: true,
        ..StateDelta::default()
    })
}

pub fn finalization_nudge(state: &LoopState, ctx: &CoordinatorContext) -> Decision {
    if !state.has_edits() || state.tool_calls <= ctx.thresholds.tool_call_soft_cap {
        return Decision::proceed();
    }
    if state.nudges.finalization == 0 {
        return Decision::new(
            PolicyKind::FinalizationNudge,
            PolicyAction::Nudge {
                message: FINALIZATION_NUDGE.to_string(),
            },
        )
        .with_delta(StateDelta {
            finalization_nudges: Some(1),
            ..StateDelta::default()
        });
    }
    Decision::new(
        PolicyKind::FinalizationNudge,
        PolicyAction::Break {
            reason: BreakReason::ToolCallHardCap,
            message: format!(
                "Stopped after {} tool calls. {}",
                state.tool_calls,
                progress_summary(state)
            ),
        },
    )
}

pub fn zero_tool_forced(
    state: &LoopState,
    ctx: &CoordinatorContext,
    snapshot: &IterationSnapshot,
) -> Decision {
    if !ctx.is_code() {
        return Decision::proceed();
    }
    if snapshot.has_tool_calls() {
        return if state.zero_tool_streak > 0 {
            Decision::update(
                PolicyKind::ZeroToolForced,
                StateDelta {
                    zero_tool_streak: Some(0),
                    ..StateDelta::default()
                },
            )
        } else {
            Decision::proceed()
        };
    }
    if snapshot.hit_length_limit() {
        return Decision::proceed();
    }

    let streak = state.zero_tool_streak + 1;
    let delta = StateDelta {
        zero_tool_streak: Some(streak),
        ..StateDelta::default()
    };

    if streak > ctx.thresholds.zero_tool_streak_limit {
        let mut options: Vec<ClarifyOption> = ctx
            .mentioned_files()
            .into_iter()
            .map(|file| file.path.as_str())
            .chain(ctx.selected.iter().map(String::as_str))
            .fold(Vec::<&str>::new(), |mut acc, path| {
                if !acc.contains(&path) {
                    acc.push(path);
                }
                acc
            })
            .into_iter()
            .take(3)
            .map(|path| ClarifyOption::new(path, format!("Edit {path}")))
            .collect();
        if let Some(first) = options.first_mut() {
            first.recommended = true;
        }
        options.push(ClarifyOption::new(
            "Describe the change in more detail",
            "Name the element, setting or section to change",
        ));
        return Decision::new(
            PolicyKind::ZeroToolForced,
            PolicyAction::Clarify {
                message: "I could not start on this change. Which file should I edit?"
                    .to_string(),
                options,
            },
        )
        .with_delta(delta);
    }

    if state.iteration == 1 {
        if let Some(target) = ctx.primary_target() {
            return Decision::new(
                PolicyKind::ZeroToolForced,
                PolicyAction::Nudge {
                    message: FORCED_READ_NUDGE.to_string(),
                },
            )
            .with_delta(StateDelta {
                forced_read: Some(target.to_string()),
                ..delta
            });
        }
    }
    Decision::update(PolicyKind::ZeroToolForced, delta)
}

pub fn completion_validator(
    state: &LoopState,
    ctx: &CoordinatorContext,
    snapshot: &IterationSnapshot,
) -> Decision {
    let limits = &ctx.thresholds;
    if !state.has_edits()
        || snapshot.has_tool_calls()
        || !budget_remains(state, ctx)
        || state.nudges.completion >= limits.max_completion_nudges
    {
        return Decision::proceed();
    }

    let edited: BTreeSet<FileType> = state
        .edited_paths()
        .into_iter()
        .map(FileType::from_path)
        .collect();
    let missing: Vec<FileType> = ctx
        .expected_categories()
        .difference(&edited)
        .copied()
        .collect();
    if missing.is_empty() {
        return Decision::proceed();
    }

    let untouched: Vec<&str> = ctx
        .mentioned_files()
        .into_iter()
        .filter(|file| missing.contains(&file.file_type))
        .map(|file| file.path.as_str())
        .collect();
    let kinds: Vec<&str> = missing.iter().map(|kind| kind.as_str()).collect();
    Decision::new(
        PolicyKind::CompletionValidator,
        PolicyAction::Nudge {
            message: format!(
                "The request also involves {} files ({}) that were not changed yet. \
                 Continue with those edits before finishing.",
                kinds.join(", "),
                untouched.join(", ")
            ),
        },
    )
    .with_delta(StateDelta {
        completion_nudges: Some(state.nudges.completion + 1),
        ..StateDelta::default()
    })
}

pub fn confirmation_gate(ctx: &CoordinatorContext, snapshot: &IterationSnapshot) -> Decision {
    if ctx.user_confirmed {
        return Decision::proceed();
    }
    let publishes = snapshot
        .categories
        .iter()
        .filter(|c| **c == ToolCategory::Publish)
        .count();
    let deletes = snapshot
        .categories
        .iter()
        .filter(|c| **c == ToolCategory::Delete)
        .count();
    if publishes == 0 && deletes < ctx.thresholds.confirm_delete_count {
        return Decision::proceed();
    }

    let message = if publishes > 0 {
        "The next step publishes the theme. Do you want to continue?".to_string()
    } else {
        let paths: Vec<&str> = snapshot
            .tool_calls
            .iter()
            .zip(&snapshot.categories)
            .filter(|(_, c)| **c == ToolCategory::Delete)
            .map(|(call, _)| call.target_path().unwrap_or(call.name.as_str()))
            .collect();
        format!(
            "The next step deletes {deletes} files: {}. Do you want to continue?",
            paths.join(", ")
        )
    };
    Decision::new(
        PolicyKind::ConfirmationGate,
        PolicyAction::Clarify {
            message,
            options: vec![
                ClarifyOption::new("Confirm", "Run the pending actions as proposed"),
                ClarifyOption::new("Cancel", "Skip them and keep the theme as it is").recommended(),
            ],
        },
    )
}

pub fn premature_stop(
    state: &LoopState,
    ctx: &CoordinatorContext,
    snapshot: &IterationSnapshot,
) -> Decision {
    if !ctx.is_code()
        || state.has_edits()
        || snapshot.has_tool_calls()
        || snapshot.hit_length_limit()
        || !budget_remains(state, ctx)
        || state.nudges.premature_stop >= ctx.thresholds.max_premature_stop_nudges
    {
        return Decision::proceed();
    }
    Decision::new(
        PolicyKind::PrematureStop,
        PolicyAction::Nudge {
            message: PREMATURE_STOP_NUDGE.to_string(),
        },
    )
    .with_delta(StateDelta {
        premature_stop_nudges: Some(state.nudges.premature_stop + 1),
        ..StateDelta::default()
    })
}

pub fn read_only_stagnation(
    state: &LoopState,
    ctx: &CoordinatorContext,
    snapshot: &IterationSnapshot,
) -> Decision {
    if !ctx.is_code() || snapshot.categories.is_empty() {
        return Decision::proceed();
    }
    if !snapshot.categories.iter().all(|c| c.is_read_only()) {
        return if state.read_only_streak > 0 {
            Decision::update(
                PolicyKind::ReadOnlyStagnation,
                StateDelta {
                    read_only_streak: Some(0),
                    ..StateDelta::default()
                },
            )
        } else {
            Decision::proceed()
        };
    }

    let streak = state.read_only_streak + 1;
    if streak < ctx.thresholds.read_only_streak_limit {
        return Decision::update(
            PolicyKind::ReadOnlyStagnation,
            StateDelta {
                read_only_streak: Some(streak),
                ..StateDelta::default()
            },
        );
    }
    Decision::new(
        PolicyKind::ReadOnlyStagnation,
        PolicyAction::Nudge {
            message: READ_ONLY_NUDGE.to_string(),
        },
    )
    .with_delta(StateDelta {
        read_only_streak: Some(0),
        force_no_lookup_until_edit: Some(true),
        ..StateDelta::default()
    })
}

pub fn post_edit_stagnation(
    state: &LoopState,
    ctx: &CoordinatorContext,
    snapshot: &IterationSnapshot,
) -> Decision {
    if !state.edit_attempted {
        return Decision::proceed();
    }
    if snapshot.new_edits > 0 {
        return if state.post_edit_stagnation > 0 {
            Decision::update(
                PolicyKind::PostEditStagnation,
                StateDelta {
                    post_edit_stagnation: Some(0),
                    ..StateDelta::default()
                },
            )
        } else {
            Decision::proceed()
        };
    }

    let limits = &ctx.thresholds;
    let stagnation = state.post_edit_stagnation + 1;
    if stagnation < limits.post_edit_stagnation_limit {
        return Decision::update(
            PolicyKind::PostEditStagnation,
            StateDelta {
                post_edit_stagnation: Some(stagnation),
                ..StateDelta::default()
            },
        );
    }

    if state.rethinks < limits.max_rethinks {
        let mut message = RETHINK_NUDGE.to_string();
        if !state.failures.is_empty() {
            message.push_str("\nFailed so far:");
            for failure in &state.failures {
                message.push_str(&format!("\n- {failure}"));
            }
        }
        return Decision::new(
            PolicyKind::PostEditStagnation,
            PolicyAction::Nudge { message },
        )
        .with_delta(StateDelta {
            post_edit_stagnation: Some(0),
            rethinks: Some(state.rethinks + 1),
            ..StateDelta::default()
        });
    }

    Decision::new(
        PolicyKind::PostEditStagnation,
        PolicyAction::Break {
            reason: BreakReason::RethinkBudgetExhausted,
            message: format!(
                "No further progress after {} rethink cycles. {}",
                state.rethinks,
                progress_summary(state)
            ),
        },
    )
}

/// Block read-only tools while lookups are disabled.
pub fn lookup_gate(state: &LoopState, catalog: &ToolCatalog, call: &ToolCall) -> Decision {
    if state.force_no_lookup_until_edit && catalog.is_lookup(&call.name) {
        return Decision::new(
            PolicyKind::LookupGate,
            PolicyAction::BlockLookup {
                reason: format!(
                    "`{}` is disabled until a file is edited. Use an edit tool now.",
                    call.name
                ),
            },
        );
    }
    Decision::proceed()
}

/// One paragraph describing edits and failures, for terminal messages.
pub fn progress_summary(state: &LoopState) -> String {
    let edited = state.edited_paths();
    let mut summary = if edited.is_empty() {
        "No files were changed.".to_string()
    } else {
        format!("Changed: {}.", edited.join(", "))
    };
    if !state.failures.is_empty() {
        let failures: Vec<String> = state.failures.iter().map(ToString::to_string).collect();
        summary.push_str(&format!(" Failed: {}.", failures.join("; ")));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::detector::{StuckDetector, StuckReport};
    use crate::failure::MutationFailureKind;
    use crate::intent::IntentMode;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use theme_protocol::{ChatMessage, FileRecord, ToolResult};

    struct AlwaysStuck;

    impl StuckDetector for AlwaysStuck {
        fn record(&self, _call: &ToolCall, _result: &ToolResult) {}

        fn report(&self) -> Option<StuckReport> {
            Some(StuckReport {
                pattern: "`read_file` called 3 times with identical input".to_string(),
                repetitions: 3,
            })
        }

        fn reset(&self) {}
    }

    fn code_ctx() -> CoordinatorContext {
        CoordinatorContext::new(
            "Make the logo in header.liquid bigger and adjust base.css",
            vec![
                FileRecord::new("1", "sections/header.liquid", ""),
                FileRecord::new("2", "assets/base.css", ""),
            ],
            &PolicyConfig::default(),
        )
        .with_intent(IntentMode::Code)
    }

    fn snapshot(calls: &[(&str, ToolCategory)]) -> IterationSnapshot {
        IterationSnapshot {
            tool_calls: calls
                .iter()
                .enumerate()
                .map(|(i, (name, _))| {
                    ToolCall::new(i.to_string(), *name, json!({ "path": format!("f{i}") }))
                })
                .collect(),
            categories: calls.iter().map(|(_, c)| *c).collect(),
            stop_reason: Some(if calls.is_empty() {
                StopReason::EndTurn
            } else {
                StopReason::ToolUse
            }),
            content: String::new(),
            new_edits: 0,
        }
    }

    #[test]
    fn test_edit_sla_first_breach_nudges_and_blocks_lookups() {
        let state = LoopState {
            iteration: 3,
            tool_calls: 6,
            ..LoopState::default()
        };
        let decision = edit_sla(&state, &code_ctx());
        assert_eq!(decision.action.name(), "nudge");
        assert_eq!(decision.delta.force_no_lookup_until_edit, Some(true));
        assert_eq!(decision.delta.edit_sla_breaches, Some(1));
    }

    #[test]
    fn test_edit_sla_second_breach_clarifies() {
        let state = LoopState {
            tool_calls: 10,
            edit_sla_breaches: 1,
            ..LoopState::default()
        };
        let decision = edit_sla(&state, &code_ctx());
        match decision.action {
            PolicyAction::Clarify { options, .. } => {
                assert_eq!(options.len(), 3);
                assert_eq!(options.iter().filter(|o| o.recommended).count(), 1);
            }
            other => panic!("expected clarify, got {other:?}"),
        }

        // Below the abort threshold nothing happens
        let state = LoopState {
            tool_calls: 8,
            edit_sla_breaches: 1,
            ..LoopState::default()
        };
        assert!(edit_sla(&state, &code_ctx()).action.is_continue());
    }

    #[test]
    fn test_edit_sla_ignores_ask_mode() {
        let state = LoopState {
            tool_calls: 20,
            ..LoopState::default()
        };
        let ctx = code_ctx().with_intent(IntentMode::Ask);
        assert!(edit_sla(&state, &ctx).action.is_continue());
    }

    #[test]
    fn test_stuck_at_budget_breaks() {
        let ctx = code_ctx().with_detector(Arc::new(AlwaysStuck));
        let state = LoopState {
            iteration: 3,
            stuck_recoveries: ctx.thresholds.max_stuck_recoveries,
            ..LoopState::default()
        };
        let decision = stuck_detection(&state, &ctx);
        assert!(matches!(
            decision.action,
            PolicyAction::Break {
                reason: BreakReason::StuckRecoveryExhausted,
                ..
            }
        ));
    }

    #[test]
    fn test_stuck_recovery_truncates_and_counts() {
        let ctx = code_ctx().with_detector(Arc::new(AlwaysStuck));
        let mut history = vec![ChatMessage::system("system")];
        for i in 0..20 {
            history.push(ChatMessage::user(format!("message {i}")));
        }
        let state = LoopState {
            iteration: 3,
            read_only_streak: 2,
            history,
            ..LoopState::default()
        };
        let decision = stuck_detection(&state, &ctx);
        assert_eq!(decision.action.name(), "nudge");
        assert_eq!(decision.delta.stuck_recoveries, Some(1));
        assert_eq!(decision.delta.read_only_streak, Some(0));
        assert!(decision.delta.reset_detector);
        let kept = decision.delta.replace_history.unwrap();
        assert_eq!(kept.len(), 1 + ctx.thresholds.history_keep_last);
        assert_eq!(kept[0].content, "system");
    }

    #[test]
    fn test_zero_tool_first_iteration_forces_read() {
        let state = LoopState {
            iteration: 1,
            ..LoopState::default()
        };
        let decision = zero_tool_forced(&state, &code_ctx(), &snapshot(&[]));
        assert_eq!(decision.action.name(), "nudge");
        assert_eq!(
            decision.delta.forced_read.as_deref(),
            Some("sections/header.liquid")
        );
        assert_eq!(decision.delta.zero_tool_streak, Some(1));
    }

    #[test]
    fn test_zero_tool_streak_over_limit_clarifies() {
        let ctx = code_ctx();
        let state = LoopState {
            iteration: 4,
            zero_tool_streak: ctx.thresholds.zero_tool_streak_limit,
            ..LoopState::default()
        };
        let decision = zero_tool_forced(&state, &ctx, &snapshot(&[]));
        match decision.action {
            PolicyAction::Clarify { options, .. } => {
                assert_eq!(options[0].label, "sections/header.liquid");
                assert!(options[0].recommended);
            }
            other => panic!("expected clarify, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_tool_ignores_length_limit() {
        let mut snap = snapshot(&[]);
        snap.stop_reason = Some(StopReason::MaxTokens);
        let state = LoopState {
            iteration: 1,
            ..LoopState::default()
        };
        assert!(zero_tool_forced(&state, &code_ctx(), &snap).action.is_continue());
        assert!(premature_stop(&state, &code_ctx(), &snap).action.is_continue());
    }

    #[test]
    fn test_completion_validator_wants_untouched_category() {
        let mut state = LoopState {
            iteration: 4,
            ..LoopState::default()
        };
        state.record_edit("sections/header.liquid", "edit_file");
        let decision = completion_validator(&state, &code_ctx(), &snapshot(&[]));
        match &decision.action {
            PolicyAction::Nudge { message } => assert!(message.contains("assets/base.css")),
            other => panic!("expected nudge, got {other:?}"),
        }
        assert_eq!(decision.delta.completion_nudges, Some(1));

        state.record_edit("assets/base.css", "edit_file");
        assert!(completion_validator(&state, &code_ctx(), &snapshot(&[]))
            .action
            .is_continue());
    }

    #[test]
    fn test_completion_validator_is_bounded() {
        let ctx = code_ctx();
        let mut state = LoopState {
            iteration: 4,
            ..LoopState::default()
        };
        state.record_edit("sections/header.liquid", "edit_file");
        state.nudges.completion = ctx.thresholds.max_completion_nudges;
        assert!(completion_validator(&state, &ctx, &snapshot(&[]))
            .action
            .is_continue());
    }

    #[test]
    fn test_confirmation_gate() {
        let ctx = code_ctx();
        let publish = snapshot(&[("publish_theme", ToolCategory::Publish)]);
        let decision = confirmation_gate(&ctx, &publish);
        match decision.action {
            PolicyAction::Clarify { options, .. } => {
                let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
                assert_eq!(labels, vec!["Confirm", "Cancel"]);
                assert!(options[1].recommended);
            }
            other => panic!("expected clarify, got {other:?}"),
        }

        let two = snapshot(&[
            ("delete_file", ToolCategory::Delete),
            ("delete_file", ToolCategory::Delete),
        ]);
        assert!(confirmation_gate(&ctx, &two).action.is_continue());
        let three = snapshot(&[
            ("delete_file", ToolCategory::Delete),
            ("delete_file", ToolCategory::Delete),
            ("delete_file", ToolCategory::Delete),
        ]);
        assert_eq!(confirmation_gate(&ctx, &three).action.name(), "clarify");

        let confirmed = ctx.with_confirmation(true);
        assert!(confirmation_gate(&confirmed, &publish).action.is_continue());
    }

    #[test]
    fn test_premature_stop_nudges_until_bounded() {
        let ctx = code_ctx();
        let mut state = LoopState {
            iteration: 2,
            ..LoopState::default()
        };
        let decision = premature_stop(&state, &ctx, &snapshot(&[]));
        assert_eq!(decision.delta.premature_stop_nudges, Some(1));

        state.nudges.premature_stop = ctx.thresholds.max_premature_stop_nudges;
        assert!(premature_stop(&state, &ctx, &snapshot(&[])).action.is_continue());
    }

    #[test]
    fn test_read_only_stagnation() {
        let ctx = code_ctx();
        let reads = snapshot(&[("read_file", ToolCategory::Read), ("grep", ToolCategory::Lookup)]);
        let state = LoopState {
            read_only_streak: 1,
            ..LoopState::default()
        };
        assert_eq!(
            read_only_stagnation(&state, &ctx, &reads).delta.read_only_streak,
            Some(2)
        );

        let state = LoopState {
            read_only_streak: ctx.thresholds.read_only_streak_limit - 1,
            ..LoopState::default()
        };
        let decision = read_only_stagnation(&state, &ctx, &reads);
        assert_eq!(decision.action.name(), "nudge");
        assert_eq!(decision.delta.force_no_lookup_until_edit, Some(true));

        let edit = snapshot(&[("edit_file", ToolCategory::Mutate)]);
        assert_eq!(
            read_only_stagnation(&state, &ctx, &edit).delta.read_only_streak,
            Some(0)
        );
    }

    #[test]
    fn test_aggressive_tier_stagnates_sooner() {
        let config = PolicyConfig::default().with_tier(crate::config::StrategyTier::Aggressive);
        let ctx = CoordinatorContext::new("fix the footer", Vec::new(), &config);
        let reads = snapshot(&[("read_file", ToolCategory::Read)]);
        let state = LoopState {
            read_only_streak: 2,
            ..LoopState::default()
        };
        assert_eq!(read_only_stagnation(&state, &ctx, &reads).action.name(), "nudge");
    }

    #[test]
    fn test_post_edit_stagnation_rethinks_then_breaks() {
        let ctx = code_ctx();
        let limit = ctx.thresholds.post_edit_stagnation_limit;
        let mut state = LoopState::default();
        state.record_failure("sections/header.liquid", MutationFailureKind::OldTextNotFound);
        state.post_edit_stagnation = limit - 1;

        let decision = post_edit_stagnation(&state, &ctx, &snapshot(&[]));
        match &decision.action {
            PolicyAction::Nudge { message } => {
                assert!(message.contains("sections/header.liquid: old text not found"));
            }
            other => panic!("expected nudge, got {other:?}"),
        }
        assert_eq!(decision.delta.rethinks, Some(1));

        state.rethinks = ctx.thresholds.max_rethinks;
        let decision = post_edit_stagnation(&state, &ctx, &snapshot(&[]));
        match decision.action {
            PolicyAction::Break { reason, message } => {
                assert_eq!(reason, BreakReason::RethinkBudgetExhausted);
                assert!(message.contains("Failed: sections/header.liquid"));
            }
            other => panic!("expected break, got {other:?}"),
        }
    }

    #[test]
    fn test_finalization_nudge_then_break() {
        let ctx = code_ctx();
        let mut state = LoopState {
            tool_calls: ctx.thresholds.tool_call_soft_cap + 1,
            ..LoopState::default()
        };
        assert!(finalization_nudge(&state, &ctx).action.is_continue());

        state.record_edit("sections/header.liquid", "edit_file");
        assert_eq!(finalization_nudge(&state, &ctx).action.name(), "nudge");
        state.nudges.finalization = 1;
        assert_eq!(finalization_nudge(&state, &ctx).action.name(), "break");
    }

    #[test]
    fn test_lookup_gate() {
        let catalog = ToolCatalog::default();
        let grep = ToolCall::new("1", "grep", json!({ "pattern": "logo" }));
        let edit = ToolCall::new("2", "edit_file", json!({ "path": "a.liquid" }));
        let mut state = LoopState::default();
        assert!(lookup_gate(&state, &catalog, &grep).action.is_continue());

        state.force_no_lookup_until_edit = true;
        assert_eq!(lookup_gate(&state, &catalog, &grep).action.name(), "block_lookup");
        assert!(lookup_gate(&state, &catalog, &edit).action.is_continue());
    }
}
