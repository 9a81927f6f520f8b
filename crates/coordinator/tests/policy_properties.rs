use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use theme_coordinator::{
    confirmation_gate, edit_sla, stuck_detection, BreakReason, CheckPoint, CoordinatorContext,
    IntentMode, IterationSnapshot, LoopState, PolicyAction, PolicyConfig, PolicyEngine,
    StuckDetector, StuckReport,
};
use theme_protocol::{StopReason, ToolCall, ToolCategory, ToolResult};

struct AlwaysStuck;

impl StuckDetector for AlwaysStuck {
    fn record(&self, _call: &ToolCall, _result: &ToolResult) {}

    fn report(&self) -> Option<StuckReport> {
        Some(StuckReport {
            pattern: "`grep` called 3 times with identical input".to_string(),
            repetitions: 3,
        })
    }

    fn reset(&self) {}
}

fn category() -> impl Strategy<Value = ToolCategory> {
    prop_oneof![
        Just(ToolCategory::Read),
        Just(ToolCategory::Lookup),
        Just(ToolCategory::Mutate),
        Just(ToolCategory::Delete),
        Just(ToolCategory::Publish),
        Just(ToolCategory::Other),
    ]
}

fn snapshot(categories: &[ToolCategory]) -> IterationSnapshot {
    IterationSnapshot {
        tool_calls: categories
            .iter()
            .enumerate()
            .map(|(i, _)| ToolCall::new(i.to_string(), "tool", json!({ "path": format!("f{i}") })))
            .collect(),
        categories: categories.to_vec(),
        stop_reason: Some(StopReason::ToolUse),
        ..IterationSnapshot::default()
    }
}

#[test]
fn code_mode_sla_breach_at_six_calls() {
    let ctx = CoordinatorContext::new("fix the footer", Vec::new(), &PolicyConfig::default());
    let state = LoopState {
        iteration: 2,
        tool_calls: 6,
        ..LoopState::default()
    };
    let decision = edit_sla(&state, &ctx);
    assert!(matches!(decision.action, PolicyAction::Nudge { .. }));
    assert_eq!(decision.delta.force_no_lookup_until_edit, Some(true));
}

proptest! {
    #[test]
    fn prop_stuck_recoveries_are_bounded(max in 0usize..6, extra in 1usize..5) {
        let mut config = PolicyConfig::default();
        config.default.max_stuck_recoveries = max;
        let ctx = CoordinatorContext::new("fix the footer", Vec::new(), &config)
            .with_detector(Arc::new(AlwaysStuck));

        let mut state = LoopState::default();
        let mut nudges = 0;
        let mut broke = false;
        for _ in 0..(max + extra) {
            state.iteration += 1;
            let decision = stuck_detection(&state, &ctx);
            match decision.action {
                PolicyAction::Nudge { .. } => {
                    prop_assert!(!broke);
                    nudges += 1;
                }
                PolicyAction::Break { reason, message } => {
                    prop_assert_eq!(reason, BreakReason::StuckRecoveryExhausted);
                    prop_assert!(!message.is_empty());
                    broke = true;
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
            decision.delta.apply(&mut state);
            prop_assert!(state.stuck_recoveries <= max);
        }
        prop_assert_eq!(nudges, max);
        prop_assert!(broke);
    }

    #[test]
    fn prop_destructive_calls_never_pass_unconfirmed(
        categories in proptest::collection::vec(category(), 0..8),
        confirmed in any::<bool>(),
        zero_tool_streak in 0usize..3,
    ) {
        let ctx = CoordinatorContext::new("fix the footer", Vec::new(), &PolicyConfig::default())
            .with_intent(IntentMode::Code)
            .with_confirmation(confirmed);
        let snap = snapshot(&categories);
        let publishes = categories.iter().filter(|c| **c == ToolCategory::Publish).count();
        let deletes = categories.iter().filter(|c| **c == ToolCategory::Delete).count();
        let destructive = publishes > 0 || deletes >= ctx.thresholds.confirm_delete_count;

        let gate = confirmation_gate(&ctx, &snap);
        match gate.action {
            PolicyAction::Clarify { options, .. } => {
                prop_assert!(destructive && !confirmed);
                prop_assert!(options.iter().any(|o| o.recommended && o.label == "Cancel"));
            }
            PolicyAction::Continue => prop_assert!(!destructive || confirmed),
            other => prop_assert!(false, "unexpected {:?}", other),
        }

        // Through the engine, no earlier policy lets a destructive batch slip by
        let state = LoopState {
            iteration: 2,
            zero_tool_streak,
            ..LoopState::default()
        };
        let decision = PolicyEngine::new().evaluate(CheckPoint::PostResponse, &state, &ctx, Some(&snap));
        if destructive && !confirmed {
            prop_assert_eq!(decision.action.name(), "clarify");
        }
    }
}
