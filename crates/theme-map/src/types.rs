use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use theme_protocol::FileType;

/// Lifecycle of a project's theme map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStatus {
    #[default]
    Pending,
    Indexing,
    Ready,
    Enriching,
    Stale,
}

/// A named, line-ranged region of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Inclusive 1-based `[start, end]`; `[0, 0]` once an edit made it stale.
    pub lines: [usize; 2],
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Feature {
    pub const STALE: [usize; 2] = [0, 0];

    pub fn new(start: usize, end: usize, description: impl Into<String>) -> Self {
        Self {
            lines: [start, end],
            description: description.into(),
            keywords: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn is_stale(&self) -> bool {
        self.lines == Self::STALE
    }

    pub fn mark_stale(&mut self) {
        self.lines = Self::STALE;
    }
}

/// Per-file entry of the theme map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeMapFile {
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub purpose: String,
    #[serde(default)]
    pub features: BTreeMap<String, Feature>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub rendered_by: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Content hash the summary was written for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl ThemeMapFile {
    pub fn new(path: impl Into<String>, file_type: FileType, purpose: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_type,
            purpose: purpose.into(),
            features: BTreeMap::new(),
            depends_on: Vec::new(),
            rendered_by: Vec::new(),
            patterns: Vec::new(),
            summary: None,
            summary_hash: None,
            content_hash: None,
        }
    }

    /// File name component of the path.
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Summary exists and was written for the current content.
    pub fn has_fresh_summary(&self) -> bool {
        self.summary.is_some() && self.summary_hash.is_some() && self.summary_hash == self.content_hash
    }

    pub fn stale_feature_count(&self) -> usize {
        self.features.values().filter(|f| f.is_stale()).count()
    }
}

/// Whole-project structural index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeMap {
    pub project_id: String,
    pub version: u64,
    #[serde(default)]
    pub files: BTreeMap<String, ThemeMapFile>,
    #[serde(default)]
    pub global_patterns: Vec<String>,
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default)]
    pub status: MapStatus,
}

impl ThemeMap {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            version: 0,
            files: BTreeMap::new(),
            global_patterns: Vec::new(),
            entry_points: Vec::new(),
            framework: None,
            status: MapStatus::Pending,
        }
    }

    /// Record a mutation.
    pub fn bump(&mut self) {
        self.version += 1;
    }

    pub fn file(&self, path: &str) -> Option<&ThemeMapFile> {
        self.files.get(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn feature_count(&self) -> usize {
        self.files.values().map(|f| f.features.len()).sum()
    }
}
