use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationFailureKind {
    /// The text to replace was not in the file
    OldTextNotFound,
    FileNotFound,
    /// Anything else the tool refused
    Rejected,
}

impl MutationFailureKind {
    /// Classify a failed mutation from the tool's error text.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("old_text")
            || lower.contains("old text")
            || lower.contains("text not found")
            || lower.contains("no match")
        {
            Self::OldTextNotFound
        } else if lower.contains("no such file")
            || lower.contains("file not found")
            || lower.contains("does not exist")
        {
            Self::FileNotFound
        } else {
            Self::Rejected
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OldTextNotFound => "old text not found",
            Self::FileNotFound => "file not found",
            Self::Rejected => "rejected",
        }
    }
}

/// A mutation that did not apply, with how often it was tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationFailure {
    pub kind: MutationFailureKind,
    pub path: String,
    pub attempts: usize,
}

impl fmt::Display for MutationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} attempt{})",
            self.path,
            self.kind.as_str(),
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        )
    }
}
