use crate::action::{CheckPoint, Decision, PolicyKind};
use crate::context::CoordinatorContext;
use crate::policies::IterationSnapshot;
use crate::state::LoopState;

/// Runs the policies of a check point in priority order.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    /// Policies switched off for this deployment
    disabled: Vec<PolicyKind>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn without(mut self, policy: PolicyKind) -> Self {
        if !self.disabled.contains(&policy) {
            self.disabled.push(policy);
        }
        self
    }

    pub fn is_enabled(&self, policy: PolicyKind) -> bool {
        !self.disabled.contains(&policy)
    }

    /// First non-`continue` decision of the check point, carrying the deltas
    /// of every policy evaluated before it. With no such decision the result
    /// is `continue` with all deltas merged.
    pub fn evaluate(
        &self,
        checkpoint: CheckPoint,
        state: &LoopState,
        ctx: &CoordinatorContext,
        snapshot: Option<&IterationSnapshot>,
    ) -> Decision {
        let mut merged = Decision::proceed();
        for policy in checkpoint.policies() {
            if !self.is_enabled(*policy) {
                continue;
            }
            let decision = policy.evaluate(state, ctx, snapshot);
            merged.delta.merge(decision.delta);
            if !decision.action.is_continue() {
                log::info!(
                    "iteration {}: {} -> {}",
                    state.iteration,
                    policy.as_str(),
                    decision.action.name()
                );
                merged.policy = decision.policy;
                merged.action = decision.action;
                return merged;
            }
        }
        if !merged.delta.is_empty() {
            log::debug!(
                "iteration {}: {:?} counters updated",
                state.iteration,
                checkpoint
            );
        }
        merged
    }
}
