use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// What the user wants out of an execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentMode {
    /// Change the theme
    Code,
    /// Answer a question, no edits expected
    #[default]
    Ask,
    /// Produce a plan without touching files
    Plan,
}

static PLAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:plan|outline|propose|draft a plan|how should (?:i|we))\b")
        .expect("valid plan regex")
});

static CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:change|make|add|remove|delete|fix|update|move|replace|set|hide|show|increase|decrease|rename|create|style|align|center|centre|bigger|smaller)\b",
    )
    .expect("valid code regex")
});

static QUESTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:what|why|where|which|who|does|is|are|can you explain|explain)\b")
        .expect("valid question regex")
});

impl IntentMode {
    /// Keyword heuristic for callers without an upstream classifier.
    pub fn classify(request: &str) -> Self {
        if PLAN_RE.is_match(request) {
            return Self::Plan;
        }
        // "where is the footer logo set?" is a question, not a change
        if QUESTION_RE.is_match(request) && request.trim_end().ends_with('?') {
            return Self::Ask;
        }
        if CODE_RE.is_match(request) {
            Self::Code
        } else {
            Self::Ask
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Ask => "ask",
            Self::Plan => "plan",
        }
    }
}
