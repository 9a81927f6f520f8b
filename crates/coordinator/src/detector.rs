//! Stuck pattern detection over recent tool calls.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use theme_protocol::{ToolCall, ToolResult};

pub const DEFAULT_WINDOW: usize = 10;
pub const DEFAULT_REPEAT_THRESHOLD: usize = 3;
pub const DEFAULT_FAILURE_THRESHOLD: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StuckReport {
    /// Human-readable description of the repeating call
    pub pattern: String,
    pub repetitions: usize,
}

/// Heuristic fed with every dispatched call. Shared by reference with the
/// loop, so implementations use interior mutability.
pub trait StuckDetector: Send + Sync {
    fn record(&self, call: &ToolCall, result: &ToolResult);

    fn report(&self) -> Option<StuckReport>;

    fn reset(&self);
}

/// Never reports anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDetector;

impl StuckDetector for NoopDetector {
    fn record(&self, _call: &ToolCall, _result: &ToolResult) {}

    fn report(&self) -> Option<StuckReport> {
        None
    }

    fn reset(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Signature {
    tool: String,
    args_hash: u64,
    failed: bool,
}

impl Signature {
    fn same_call(&self, other: &Self) -> bool {
        self.tool == other.tool && self.args_hash == other.args_hash
    }
}

fn args_hash(input: &serde_json::Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    serde_json::to_string(input)
        .unwrap_or_default()
        .hash(&mut hasher);
    hasher.finish()
}

/// Rolling window of `(tool, args hash)` signatures.
///
/// Stuck when the newest call appears `repeat_threshold` times in the window,
/// or when it failed and the same failing call appears `failure_threshold`
/// times.
#[derive(Debug)]
pub struct RepeatingCallDetector {
    window: usize,
    repeat_threshold: usize,
    failure_threshold: usize,
    recent: Mutex<VecDeque<Signature>>,
}

impl Default for RepeatingCallDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_REPEAT_THRESHOLD, DEFAULT_FAILURE_THRESHOLD)
    }
}

impl RepeatingCallDetector {
    pub fn new(window: usize, repeat_threshold: usize, failure_threshold: usize) -> Self {
        Self {
            window: window.max(1),
            repeat_threshold: repeat_threshold.max(2),
            failure_threshold: failure_threshold.max(2),
            recent: Mutex::new(VecDeque::with_capacity(window)),
        }
    }
}

impl StuckDetector for RepeatingCallDetector {
    fn record(&self, call: &ToolCall, result: &ToolResult) {
        let mut recent = self
            .recent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        recent.push_back(Signature {
            tool: call.name.clone(),
            args_hash: args_hash(&call.input),
            failed: result.is_error,
        });
        while recent.len() > self.window {
            recent.pop_front();
        }
    }

    fn report(&self) -> Option<StuckReport> {
        let recent = self
            .recent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let last = recent.back()?;
        let repetitions = recent.iter().filter(|s| s.same_call(last)).count();
        let failures = recent
            .iter()
            .filter(|s| s.failed && s.same_call(last))
            .count();

        if repetitions >= self.repeat_threshold {
            Some(StuckReport {
                pattern: format!("`{}` called {repetitions} times with identical input", last.tool),
                repetitions,
            })
        } else if last.failed && failures >= self.failure_threshold {
            Some(StuckReport {
                pattern: format!("`{}` failed {failures} times with identical input", last.tool),
                repetitions: failures,
            })
        } else {
            None
        }
    }

    fn reset(&self) {
        self.recent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}
