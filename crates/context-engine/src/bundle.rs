use serde::{Deserialize, Serialize};
use theme_protocol::FileRecord;

/// Files chosen for one model turn, in inclusion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub files: Vec<FileRecord>,
    /// Known ids left out because the budget ran out
    pub excluded: Vec<String>,
    /// Requested ids the engine does not know
    pub missing: Vec<String>,
    pub used_tokens: usize,
    pub budget: usize,
}

impl ContextBundle {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    pub fn file_ids(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.id.as_str()).collect()
    }

    pub fn remaining_tokens(&self) -> usize {
        self.budget.saturating_sub(self.used_tokens)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
