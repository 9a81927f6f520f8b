use serde::{Deserialize, Serialize};

/// A structural region of one theme file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    #[serde(rename = "type")]
    pub kind: ChunkKind,

    /// The exact source text of the region
    pub content: String,

    /// Source file path
    pub file: String,

    /// Start line (1-indexed)
    pub line_start: usize,

    /// End line (1-indexed, inclusive)
    pub line_end: usize,

    pub metadata: ChunkMetadata,
}

impl Chunk {
    #[must_use]
    pub const fn new(
        kind: ChunkKind,
        file: String,
        line_start: usize,
        line_end: usize,
        content: String,
        metadata: ChunkMetadata,
    ) -> Self {
        Self {
            kind,
            content,
            file,
            line_start,
            line_end,
            metadata,
        }
    }

    /// Get the number of lines in this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.line_end.saturating_sub(self.line_start) + 1
    }

    #[must_use]
    pub const fn estimated_tokens(&self) -> usize {
        self.metadata.estimated_tokens
    }

    /// Check if chunk contains a specific line
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.line_start && line <= self.line_end
    }

    /// The most specific human-readable identifier carried by the metadata.
    pub fn identifier(&self) -> Option<&str> {
        let m = &self.metadata;
        match self.kind {
            ChunkKind::Setting => m.setting_id.as_deref(),
            ChunkKind::Block => m.block_type.as_deref(),
            ChunkKind::Preset => m.preset_name.as_deref(),
            ChunkKind::RawSchema => m.schema_name.as_deref(),
            ChunkKind::Render => m.render_target.as_deref(),
            ChunkKind::Conditional => m.condition.as_deref(),
            ChunkKind::Rule => m.selector.as_deref(),
            ChunkKind::Function | ChunkKind::Class => m.function_name.as_deref(),
            ChunkKind::ConfigKey => m.config_key.as_deref(),
            ChunkKind::WholeFile => None,
        }
    }
}

/// Which pass produced a chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParseSource {
    #[default]
    Grammar,
    Regex,
    Whole,
}

/// Metadata about a chunk. Which fields are set depends on [`ChunkKind`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting_type: Option<String>,

    /// Setting, block or preset label as declared in the schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_name: Option<String>,

    /// Name declared by the enclosing schema block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Enclosing `@media` / `@supports` prelude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    /// Enclosing class, or the block a nested setting belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_key: Option<String>,

    /// Identifiers referenced from inside the chunk (render targets, section types)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    /// Estimated token count (rough approximation)
    pub estimated_tokens: usize,

    #[serde(default)]
    pub source: ParseSource,
}

impl ChunkMetadata {
    pub const fn from_source(source: ParseSource) -> Self {
        Self {
            setting_id: None,
            setting_type: None,
            label: None,
            block_type: None,
            preset_name: None,
            schema_name: None,
            selector: None,
            media: None,
            function_name: None,
            parent_scope: None,
            render_target: None,
            condition: None,
            config_key: None,
            references: Vec::new(),
            estimated_tokens: 0,
            source,
        }
    }

    #[must_use]
    pub fn setting(mut self, id: impl Into<String>) -> Self {
        self.setting_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn setting_type(mut self, kind: Option<String>) -> Self {
        self.setting_type = kind;
        self
    }

    #[must_use]
    pub fn label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    #[must_use]
    pub fn block_type(mut self, kind: impl Into<String>) -> Self {
        self.block_type = Some(kind.into());
        self
    }

    #[must_use]
    pub fn preset_name(mut self, name: impl Into<String>) -> Self {
        self.preset_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn schema_name(mut self, name: Option<String>) -> Self {
        self.schema_name = name;
        self
    }

    #[must_use]
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    #[must_use]
    pub fn media(mut self, media: Option<String>) -> Self {
        self.media = media;
        self
    }

    #[must_use]
    pub fn function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn parent_scope(mut self, scope: Option<String>) -> Self {
        self.parent_scope = scope;
        self
    }

    #[must_use]
    pub fn render_target(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.references.push(target.clone());
        self.render_target = Some(target);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    #[must_use]
    pub fn config_key(mut self, key: impl Into<String>) -> Self {
        self.config_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn add_reference(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }

    /// Rough heuristic: 4 chars per token
    #[must_use]
    pub fn estimate_tokens_from_content(content: &str) -> usize {
        (content.len() / 4).max(1)
    }
}

/// Structural role of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// One entry of a schema `settings` array
    Setting,
    /// One entry of a schema `blocks` array
    Block,
    /// One entry of a schema `presets` array
    Preset,
    /// Schema block that could not be split
    #[serde(rename = "schema")]
    RawSchema,
    /// `render` / `include` / `section` call
    Render,
    /// Outermost `if` / `unless` / `case` block
    Conditional,
    /// Style rule (or non-container at-rule)
    Rule,
    Function,
    Class,
    /// Top-level key of a JSON config file
    ConfigKey,
    WholeFile,
}

impl ChunkKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setting => "setting",
            Self::Block => "block",
            Self::Preset => "preset",
            Self::RawSchema => "schema",
            Self::Render => "render",
            Self::Conditional => "conditional",
            Self::Rule => "rule",
            Self::Function => "function",
            Self::Class => "class",
            Self::ConfigKey => "config_key",
            Self::WholeFile => "whole_file",
        }
    }

    /// Kinds that come out of an embedded schema block
    #[must_use]
    pub const fn is_schema(self) -> bool {
        matches!(
            self,
            Self::Setting | Self::Block | Self::Preset | Self::RawSchema
        )
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
