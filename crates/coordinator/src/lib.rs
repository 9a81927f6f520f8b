//! # Theme Coordinator
//!
//! Policy engine that keeps a tool-using model on track while it edits a
//! theme, and the loop that drives it.
//!
//! ```text
//! loop ─┬─ PreIteration     edit SLA · stuck detection · finalization
//!       ├─ model request    (raced against cancellation)
//!       ├─ PostResponse     zero-tool · completion · confirmation · premature stop
//!       ├─ tool dispatch    lookup gate · normalize · record edits/failures
//!       └─ PostToolDispatch read-only stagnation · post-edit stagnation
//! ```
//!
//! Every policy is a pure function returning a [`PolicyAction`] plus a
//! [`StateDelta`]; only [`CoordinationLoop`] mutates [`LoopState`]. Each
//! check point yields at most one non-`continue` action per iteration.

mod action;
mod config;
mod context;
mod detector;
mod engine;
mod error;
mod failure;
mod intent;
mod outcome;
mod policies;
mod runner;
mod state;

pub use action::{BreakReason, CheckPoint, ClarifyOption, Decision, PolicyAction, PolicyKind};
pub use config::{PolicyConfig, PolicyThresholds, StrategyTier};
pub use context::CoordinatorContext;
pub use detector::{
    NoopDetector, RepeatingCallDetector, StuckDetector, StuckReport, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_REPEAT_THRESHOLD, DEFAULT_WINDOW,
};
pub use engine::PolicyEngine;
pub use error::{CoordinatorError, Result};
pub use failure::{MutationFailure, MutationFailureKind};
pub use intent::IntentMode;
pub use outcome::{ExecutionOutcome, ExecutionStatus};
pub use policies::{
    completion_validator, confirmation_gate, edit_sla, finalization_nudge, lookup_gate,
    post_edit_stagnation, premature_stop, progress_summary, read_only_stagnation,
    stuck_detection, zero_tool_forced, IterationSnapshot,
};
pub use runner::CoordinationLoop;
pub use state::{truncate_history, EditRecord, LoopState, NudgeCounters, StateDelta};
