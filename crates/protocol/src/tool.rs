use crate::message::ToolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// What a tool does to the project, as far as coordination is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Read,
    Lookup,
    Mutate,
    Delete,
    Publish,
    Other,
}

impl ToolCategory {
    /// Read and lookup tools never change the project.
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::Read | Self::Lookup)
    }

    pub const fn is_mutating(self) -> bool {
        matches!(self, Self::Mutate | Self::Delete)
    }
}

const READ_TOOLS: &[&str] = &["read_file", "read_files", "view_file", "get_file"];
const LOOKUP_TOOLS: &[&str] = &[
    "search",
    "search_files",
    "grep",
    "list_files",
    "theme_map_lookup",
    "find_references",
];
const MUTATE_TOOLS: &[&str] = &[
    "edit_file",
    "replace",
    "replace_in_file",
    "write_file",
    "create_file",
    "insert_before",
    "insert_after",
];
const DELETE_TOOLS: &[&str] = &["delete_file", "remove_file"];
const PUBLISH_TOOLS: &[&str] = &["publish", "publish_theme", "deploy"];

/// Maps tool names to categories. Unknown names are `Other`.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    categories: HashMap<String, ToolCategory>,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        let mut catalog = Self {
            categories: HashMap::new(),
        };
        for (names, category) in [
            (READ_TOOLS, ToolCategory::Read),
            (LOOKUP_TOOLS, ToolCategory::Lookup),
            (MUTATE_TOOLS, ToolCategory::Mutate),
            (DELETE_TOOLS, ToolCategory::Delete),
            (PUBLISH_TOOLS, ToolCategory::Publish),
        ] {
            for name in names {
                catalog.register(*name, category);
            }
        }
        catalog
    }
}

impl ToolCatalog {
    pub fn register(&mut self, name: impl Into<String>, category: ToolCategory) {
        self.categories.insert(name.into(), category);
    }

    pub fn category(&self, name: &str) -> ToolCategory {
        self.categories
            .get(name)
            .copied()
            .unwrap_or(ToolCategory::Other)
    }

    pub fn is_lookup(&self, name: &str) -> bool {
        self.category(name).is_read_only()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("execution failed: {0}")]
    Execution(String),
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run one tool call. `Ok(None)` means the tool produced no result at all.
    async fn execute(&self, call: &ToolCall) -> Result<Option<Value>, ToolError>;
}

/// Normalized tool output as it enters the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Convert whatever the executor returned into a well-formed result.
    ///
    /// Accepted shapes: a bare string, or an object with `content` (string) and
    /// optional `is_error` (bool). Anything else becomes a diagnostic error.
    /// An empty result from a mutating tool is an implicit failure.
    pub fn normalize(
        tool_name: &str,
        category: ToolCategory,
        raw: Result<Option<Value>, ToolError>,
    ) -> Self {
        let value = match raw {
            Ok(Some(value)) => value,
            Ok(None) => {
                return Self::error(format!("Tool `{tool_name}` returned no result"));
            }
            Err(err) => return Self::error(format!("Tool `{tool_name}` failed: {err}")),
        };

        let result = match value {
            Value::String(content) => Self::ok(content),
            Value::Object(ref map) => match map.get("content") {
                Some(Value::String(content)) => Self {
                    content: content.clone(),
                    is_error: map
                        .get("is_error")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                },
                Some(Value::Null) | None => Self {
                    content: String::new(),
                    is_error: map
                        .get("is_error")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                },
                Some(other) => {
                    return Self::error(format!(
                        "Tool `{tool_name}` returned malformed content ({}): {other}",
                        json_kind(other)
                    ));
                }
            },
            Value::Null => Self::ok(String::new()),
            other => {
                return Self::error(format!(
                    "Tool `{tool_name}` returned malformed result ({}): {other}",
                    json_kind(&other)
                ));
            }
        };

        if !result.is_error && result.content.trim().is_empty() && category.is_mutating() {
            return Self::error(format!(
                "Tool `{tool_name}` returned an empty result; the change was not applied"
            ));
        }
        result
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn catalog_defaults() {
        let catalog = ToolCatalog::default();
        assert_eq!(catalog.category("read_file"), ToolCategory::Read);
        assert_eq!(catalog.category("theme_map_lookup"), ToolCategory::Lookup);
        assert_eq!(catalog.category("edit_file"), ToolCategory::Mutate);
        assert_eq!(catalog.category("delete_file"), ToolCategory::Delete);
        assert_eq!(catalog.category("publish_theme"), ToolCategory::Publish);
        assert_eq!(catalog.category("telepathy"), ToolCategory::Other);
        assert!(catalog.is_lookup("grep"));
        assert!(!catalog.is_lookup("edit_file"));
    }

    #[test]
    fn custom_registration_overrides() {
        let mut catalog = ToolCatalog::default();
        catalog.register("telepathy", ToolCategory::Read);
        assert_eq!(catalog.category("telepathy"), ToolCategory::Read);
    }

    #[test]
    fn normalize_accepts_string_and_object() {
        assert_eq!(
            ToolResult::normalize("read_file", ToolCategory::Read, Ok(Some(json!("body")))),
            ToolResult::ok("body")
        );
        assert_eq!(
            ToolResult::normalize(
                "edit_file",
                ToolCategory::Mutate,
                Ok(Some(json!({"content": "old text not found", "is_error": true})))
            ),
            ToolResult::error("old text not found")
        );
    }

    #[test]
    fn normalize_missing_and_failed() {
        let missing = ToolResult::normalize("grep", ToolCategory::Lookup, Ok(None));
        assert!(missing.is_error);
        assert!(missing.content.contains("no result"));

        let failed = ToolResult::normalize(
            "grep",
            ToolCategory::Lookup,
            Err(ToolError::Execution("boom".into())),
        );
        assert!(failed.is_error);
        assert!(failed.content.contains("boom"));
    }

    #[test]
    fn normalize_malformed() {
        let result = ToolResult::normalize("grep", ToolCategory::Lookup, Ok(Some(json!([1, 2]))));
        assert!(result.is_error);
        assert!(result.content.contains("array"));

        let result = ToolResult::normalize(
            "grep",
            ToolCategory::Lookup,
            Ok(Some(json!({"content": 42}))),
        );
        assert!(result.is_error);
    }

    #[test]
    fn empty_mutation_is_failure() {
        let result = ToolResult::normalize("edit_file", ToolCategory::Mutate, Ok(Some(json!(""))));
        assert!(result.is_error);

        // Empty read output is fine.
        let result = ToolResult::normalize("read_file", ToolCategory::Read, Ok(Some(json!(""))));
        assert!(!result.is_error);
    }
}
