//! JSON config files: settings data, settings schema, JSON templates, locales.

use crate::error::{ChunkerError, Result};
use crate::json_spans::{self, JsonNode, JsonSpan};
use crate::lines::{slice_lines, LineIndex};
use crate::strategy::ChunkStrategy;
use crate::types::{Chunk, ChunkKind, ChunkMetadata, ParseSource};
use once_cell::sync::Lazy;
use regex::Regex;

/// Splits a config document at its top-level keys.
///
/// JSON templates additionally get one chunk per entry of `sections`, carrying
/// the section type as a reference. A root array (settings schema) is split
/// per element, keyed by the element's `name`.
pub struct JsonGrammarStrategy;

impl ChunkStrategy for JsonGrammarStrategy {
    fn name(&self) -> &'static str {
        "json-grammar"
    }

    fn chunk(&self, path: &str, content: &str) -> Result<Vec<Chunk>> {
        let root = json_spans::scan(content)?;
        let index = LineIndex::new(content);
        let make = |span: &JsonSpan, start: usize, metadata: ChunkMetadata| {
            let (line_start, line_end) = index.span_lines(start, span.end);
            Chunk::new(
                ChunkKind::ConfigKey,
                path.to_string(),
                line_start,
                line_end,
                content[start..span.end].to_string(),
                metadata,
            )
        };

        let mut chunks = Vec::new();
        match &root.node {
            JsonNode::Object(members) => {
                for member in members {
                    chunks.push(make(
                        &member.value,
                        member.key_start,
                        ChunkMetadata::from_source(ParseSource::Grammar).config_key(&member.key),
                    ));
                    if member.key != "sections" {
                        continue;
                    }
                    for section in member.value.members() {
                        let Some(section_type) = section.value.str_field("type") else {
                            continue;
                        };
                        chunks.push(make(
                            &section.value,
                            section.key_start,
                            ChunkMetadata::from_source(ParseSource::Grammar)
                                .config_key(format!("sections.{}", section.key))
                                .add_reference(section_type),
                        ));
                    }
                }
            }
            JsonNode::Array(items) => {
                for (position, item) in items.iter().enumerate() {
                    let key = item
                        .str_field("name")
                        .unwrap_or_else(|| format!("[{position}]"));
                    chunks.push(make(
                        item,
                        item.start,
                        ChunkMetadata::from_source(ParseSource::Grammar).config_key(key),
                    ));
                }
            }
            JsonNode::String(_) | JsonNode::Scalar => {
                return Err(ChunkerError::parse("config root is a scalar"));
            }
        }
        Ok(chunks)
    }
}

static KEY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(\s*)"([^"]+)"\s*:"#).expect("valid key regex"));

/// Indentation-based approximation: keys at the shallowest indentation are
/// top-level, each running until the next one.
pub struct JsonRegexStrategy;

impl ChunkStrategy for JsonRegexStrategy {
    fn name(&self) -> &'static str {
        "json-regex"
    }

    fn chunk(&self, path: &str, content: &str) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = content.lines().collect();
        let keys: Vec<(usize, usize, String)> = lines
            .iter()
            .enumerate()
            .filter_map(|(idx, line)| {
                let caps = KEY_LINE.captures(line)?;
                Some((idx, caps.get(1)?.as_str().len(), caps.get(2)?.as_str().to_string()))
            })
            .collect();
        let Some(min_indent) = keys.iter().map(|(_, indent, _)| *indent).min() else {
            return Ok(Vec::new());
        };
        let top: Vec<_> = keys
            .into_iter()
            .filter(|(_, indent, _)| *indent == min_indent)
            .collect();

        // Last key stops before the closing brace of the root object.
        let last_line = lines
            .iter()
            .rposition(|line| line.trim() == "}")
            .map_or(lines.len().saturating_sub(1), |close| close.saturating_sub(1));

        Ok(top
            .iter()
            .enumerate()
            .map(|(pos, (idx, _, key))| {
                let end = top
                    .get(pos + 1)
                    .map_or(last_line, |(next, _, _)| next.saturating_sub(1));
                let end = end.max(*idx);
                Chunk::new(
                    ChunkKind::ConfigKey,
                    path.to_string(),
                    idx + 1,
                    end + 1,
                    slice_lines(content, idx + 1, end + 1),
                    ChunkMetadata::from_source(ParseSource::Regex).config_key(key.as_str()),
                )
            })
            .collect())
    }
}
