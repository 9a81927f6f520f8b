use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Coarse classification of a theme file, derived from its extension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Liquid markup (sections, snippets, layouts, templates)
    Template,
    /// CSS / SCSS
    Style,
    /// JavaScript / TypeScript
    Script,
    /// JSON settings, templates and locales
    Config,
    Other,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "liquid" => Self::Template,
            "css" | "scss" | "sass" => Self::Style,
            "js" | "mjs" | "cjs" | "ts" | "tsx" | "jsx" => Self::Script,
            "json" => Self::Config,
            _ => Self::Other,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Other, Self::from_extension)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Style => "style",
            Self::Script => "script",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A project file as handed to the core by the caller.
///
/// The core never persists `content`; it only derives metadata from it.
/// A record with empty content is a stub: its bytes must be hydrated through a
/// [`crate::FileContentLoader`] before it is shown to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(default)]
    pub content: String,
    /// Last modification time (unix ms), when the caller knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

impl FileRecord {
    /// Build a record whose name and type are derived from `path`.
    pub fn new(id: impl Into<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = normalize_path(&path.into());
        let name = path.rsplit('/').next().unwrap_or(path.as_str()).to_string();
        let file_type = FileType::from_path(&path);
        Self {
            id: id.into(),
            name,
            path,
            file_type,
            content: content.into(),
            updated_at: None,
        }
    }

    #[must_use]
    pub fn with_updated_at(mut self, updated_at: u64) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// File name without its final extension (`main-product.liquid` -> `main-product`).
    pub fn stem(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map_or(self.name.as_str(), |(stem, _)| stem)
    }

    pub fn is_stub(&self) -> bool {
        self.content.is_empty()
    }
}

/// Forward slashes, no leading `./` or `/`.
pub(crate) fn normalize_path(raw: &str) -> String {
    let replaced = raw.replace('\\', "/");
    replaced
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string()
}
