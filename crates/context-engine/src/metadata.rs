use serde::{Deserialize, Serialize};
use theme_graph::{extract_references, resolve_reference};
use theme_protocol::{FileRecord, FileType};

/// Rough token count: four bytes per token, never zero.
pub fn estimate_tokens(content: &str) -> usize {
    (content.len() / 4).max(1)
}

/// What the engine knows about one live file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub size_bytes: usize,
    pub token_estimate: usize,
    pub updated_at: Option<u64>,
    /// Resolved project paths this file points at, in source order
    pub references: Vec<String>,
}

impl FileMetadata {
    pub fn from_record(file: &FileRecord) -> Self {
        let mut references: Vec<String> = Vec::new();
        for reference in extract_references(file.file_type, &file.path, &file.content) {
            let Some(target) = resolve_reference(&reference, &file.path) else {
                continue;
            };
            if target != file.path && !references.contains(&target) {
                references.push(target);
            }
        }
        Self {
            id: file.id.clone(),
            name: file.name.clone(),
            path: file.path.clone(),
            file_type: file.file_type,
            size_bytes: file.content.len(),
            token_estimate: estimate_tokens(&file.content),
            updated_at: file.updated_at,
            references,
        }
    }
}
