//! Liquid templates: schema settings/blocks/presets, render calls and
//! conditional blocks.

use crate::error::{ChunkerError, Result};
use crate::json_spans::{self, JsonSpan};
use crate::lines::{slice_lines, squash_whitespace, LineIndex};
use crate::strategy::ChunkStrategy;
use crate::types::{Chunk, ChunkKind, ChunkMetadata, ParseSource};
use once_cell::sync::Lazy;
use regex::Regex;

/// Tags whose body is not Liquid markup and must not be tokenized.
const OPAQUE_TAGS: &[&str] = &["raw", "comment", "schema", "javascript", "stylesheet", "doc"];

const RENDER_TAGS: &[&str] = &["render", "include", "section", "sections"];

/// A `{% ... %}` tag, or one statement of a `{% liquid %}` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LiquidTag<'a> {
    pub name: &'a str,
    pub markup: &'a str,
    pub start: usize,
    pub end: usize,
}

pub(crate) fn tokenize_tags(content: &str) -> Result<Vec<LiquidTag<'_>>> {
    let mut tags = Vec::new();
    let mut pos = 0;
    let mut opaque_until: Option<String> = None;

    while let Some(rel) = content[pos..].find("{%") {
        let start = pos + rel;
        let close = content[start + 2..]
            .find("%}")
            .ok_or_else(|| ChunkerError::parse(format!("unterminated tag at byte {start}")))?;
        let inner_start = start + 2;
        let inner_end = inner_start + close;
        let end = inner_end + 2;
        pos = end;

        let inner = content[inner_start..inner_end]
            .trim_start_matches('-')
            .trim_end_matches('-');
        let trimmed = inner.trim();
        let (name, markup) = split_tag(trimmed);

        if let Some(closing) = &opaque_until {
            if name == closing {
                opaque_until = None;
                tags.push(LiquidTag {
                    name,
                    markup,
                    start,
                    end,
                });
            }
            continue;
        }

        if name == "liquid" {
            // Statements of a `{% liquid %}` tag, one per line.
            let body_offset = trimmed.as_ptr() as usize - content.as_ptr() as usize;
            let mut offset = body_offset + name.len();
            for line in trimmed[name.len()..].split_inclusive('\n') {
                let statement = line.trim();
                if !statement.is_empty() {
                    let lead = line.len() - line.trim_start().len();
                    let (stmt_name, stmt_markup) = split_tag(statement);
                    tags.push(LiquidTag {
                        name: stmt_name,
                        markup: stmt_markup,
                        start: offset + lead,
                        end: offset + lead + statement.len(),
                    });
                }
                offset += line.len();
            }
            continue;
        }

        if OPAQUE_TAGS.contains(&name) {
            opaque_until = Some(format!("end{name}"));
        }
        tags.push(LiquidTag {
            name,
            markup,
            start,
            end,
        });
    }

    if let Some(closing) = opaque_until {
        return Err(ChunkerError::parse(format!("missing {{% {closing} %}}")));
    }
    Ok(tags)
}

fn split_tag(trimmed: &str) -> (&str, &str) {
    match trimmed.find(char::is_whitespace) {
        Some(idx) => (&trimmed[..idx], trimmed[idx..].trim()),
        None => (trimmed, ""),
    }
}

static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^['"]([^'"]+)['"]"#).expect("valid quoted regex"));

fn quoted_target(markup: &str) -> Option<String> {
    QUOTED
        .captures(markup)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Grammar-aware pass: Liquid tag tokenizer plus a span-aware JSON scan of
/// the schema block.
pub struct LiquidGrammarStrategy;

impl ChunkStrategy for LiquidGrammarStrategy {
    fn name(&self) -> &'static str {
        "liquid-grammar"
    }

    fn chunk(&self, path: &str, content: &str) -> Result<Vec<Chunk>> {
        let tags = tokenize_tags(content)?;
        let index = LineIndex::new(content);
        let mut chunks = Vec::new();

        if let Some(open) = tags.iter().position(|t| t.name == "schema") {
            let close = tags[open + 1..]
                .iter()
                .find(|t| t.name == "endschema")
                .ok_or_else(|| ChunkerError::parse("schema block is not closed"))?;
            let open = &tags[open];
            chunks.extend(schema_chunks(
                path,
                content,
                &index,
                (open.end, close.start),
                (open.start, close.end),
            )?);
        }

        for tag in tags.iter().filter(|t| RENDER_TAGS.contains(&t.name)) {
            let Some(target) = quoted_target(tag.markup) else {
                continue;
            };
            let (line_start, line_end) = index.span_lines(tag.start, tag.end);
            chunks.push(Chunk::new(
                ChunkKind::Render,
                path.to_string(),
                line_start,
                line_end,
                content[tag.start..tag.end].to_string(),
                ChunkMetadata::from_source(ParseSource::Grammar).render_target(target),
            ));
        }

        chunks.extend(conditional_chunks(path, content, &index, &tags)?);
        Ok(chunks)
    }
}

fn schema_chunks(
    path: &str,
    content: &str,
    index: &LineIndex,
    (body_start, body_end): (usize, usize),
    (block_start, block_end): (usize, usize),
) -> Result<Vec<Chunk>> {
    let body = &content[body_start..body_end];
    // Strict validation first; the scanner alone tolerates comments.
    serde_json::from_str::<serde_json::Value>(body)?;
    let root = json_spans::scan(body)?;
    if !root.is_object() {
        return Err(ChunkerError::parse("schema is not a JSON object"));
    }
    let schema_name = root.str_field("name");

    let make = |kind: ChunkKind, span: &JsonSpan, metadata: ChunkMetadata| {
        let (start, end) = (body_start + span.start, body_start + span.end);
        let (line_start, line_end) = index.span_lines(start, end);
        Chunk::new(
            kind,
            path.to_string(),
            line_start,
            line_end,
            content[start..end].to_string(),
            metadata.schema_name(schema_name.clone()),
        )
    };

    let mut chunks = Vec::new();
    let settings = |container: &JsonSpan, scope: Option<String>| -> Vec<Chunk> {
        container
            .get("settings")
            .map(JsonSpan::items)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| {
                let id = item.str_field("id")?;
                Some(make(
                    ChunkKind::Setting,
                    item,
                    ChunkMetadata::from_source(ParseSource::Grammar)
                        .setting(id)
                        .setting_type(item.str_field("type"))
                        .label(item.str_field("label"))
                        .parent_scope(scope.clone()),
                ))
            })
            .collect()
    };

    chunks.extend(settings(&root, None));

    if let Some(blocks) = root.get("blocks") {
        for block in blocks.items() {
            let Some(block_type) = block.str_field("type") else {
                continue;
            };
            chunks.push(make(
                ChunkKind::Block,
                block,
                ChunkMetadata::from_source(ParseSource::Grammar)
                    .block_type(block_type.clone())
                    .label(block.str_field("name")),
            ));
            chunks.extend(settings(block, Some(format!("block:{block_type}"))));
        }
    }

    if let Some(presets) = root.get("presets") {
        for preset in presets.items() {
            let Some(name) = preset.str_field("name") else {
                continue;
            };
            chunks.push(make(
                ChunkKind::Preset,
                preset,
                ChunkMetadata::from_source(ParseSource::Grammar).preset_name(name),
            ));
        }
    }

    if chunks.is_empty() {
        let (line_start, line_end) = index.span_lines(block_start, block_end);
        chunks.push(Chunk::new(
            ChunkKind::RawSchema,
            path.to_string(),
            line_start,
            line_end,
            content[block_start..block_end].to_string(),
            ChunkMetadata::from_source(ParseSource::Grammar).schema_name(schema_name),
        ));
    }
    Ok(chunks)
}

fn closing_tag(name: &str) -> Option<&'static str> {
    match name {
        "if" => Some("endif"),
        "unless" => Some("endunless"),
        "case" => Some("endcase"),
        _ => None,
    }
}

/// Outermost conditional blocks. Unbalanced nesting is a parse failure.
fn conditional_chunks(
    path: &str,
    content: &str,
    index: &LineIndex,
    tags: &[LiquidTag<'_>],
) -> Result<Vec<Chunk>> {
    let mut stack: Vec<(&LiquidTag<'_>, &'static str)> = Vec::new();
    let mut chunks = Vec::new();

    for tag in tags {
        if let Some(closing) = closing_tag(tag.name) {
            stack.push((tag, closing));
            continue;
        }
        if !matches!(tag.name, "endif" | "endunless" | "endcase") {
            continue;
        }
        let (open, expected) = stack
            .pop()
            .ok_or_else(|| ChunkerError::parse(format!("stray {{% {} %}}", tag.name)))?;
        if expected != tag.name {
            return Err(ChunkerError::parse(format!(
                "expected {{% {expected} %}}, found {{% {} %}}",
                tag.name
            )));
        }
        if stack.is_empty() {
            let (line_start, line_end) = index.span_lines(open.start, tag.end);
            let condition = squash_whitespace(&format!("{} {}", open.name, open.markup));
            chunks.push(Chunk::new(
                ChunkKind::Conditional,
                path.to_string(),
                line_start,
                line_end,
                content[open.start..tag.end].to_string(),
                ChunkMetadata::from_source(ParseSource::Grammar).condition(condition),
            ));
        }
    }

    if let Some((open, _)) = stack.last() {
        return Err(ChunkerError::parse(format!(
            "unclosed {{% {} %}} at byte {}",
            open.name, open.start
        )));
    }
    Ok(chunks)
}

static SCHEMA_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{%-?\s*schema\s*-?%\}(.*?)\{%-?\s*endschema\s*-?%\}")
        .expect("valid schema regex")
});
static SETTING_ID_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*"id"\s*:\s*"([^"]+)"\s*,?\s*$"#).expect("valid setting id regex")
});
static LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""label"\s*:\s*"([^"]*)""#).expect("valid label regex"));
static TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""type"\s*:\s*"([^"]*)""#).expect("valid type regex"));
static RENDER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:\{%-?\s*|^\s*)(?:render|include|section)\s+['"]([^'"]+)['"]"#)
        .expect("valid render regex")
});

/// How far the regex pass looks around an `"id"` line for its enclosing braces
const SETTING_SEARCH_LINES: usize = 12;

/// Regex approximation used when the tokenizer or the schema JSON fails.
pub struct LiquidRegexStrategy;

impl ChunkStrategy for LiquidRegexStrategy {
    fn name(&self) -> &'static str {
        "liquid-regex"
    }

    fn chunk(&self, path: &str, content: &str) -> Result<Vec<Chunk>> {
        let index = LineIndex::new(content);
        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();

        if let Some(caps) = SCHEMA_BLOCK.captures(content) {
            let (Some(block), Some(body)) = (caps.get(0), caps.get(1)) else {
                return Ok(chunks);
            };
            let (block_first, block_last) = index.span_lines(block.start(), block.end());
            let (body_first, body_last) = index.span_lines(body.start(), body.end());

            let mut settings = Vec::new();
            for line_no in body_first..=body_last {
                let Some(id) = lines
                    .get(line_no - 1)
                    .and_then(|line| SETTING_ID_LINE.captures(line))
                    .and_then(|caps| caps.get(1))
                else {
                    continue;
                };
                let first = (line_no.saturating_sub(SETTING_SEARCH_LINES).max(body_first)..line_no)
                    .rev()
                    .find(|n| lines[n - 1].trim_end().ends_with('{'))
                    .unwrap_or(line_no);
                let last = (line_no + 1..=(line_no + SETTING_SEARCH_LINES).min(body_last))
                    .find(|n| lines[n - 1].trim_start().starts_with('}'))
                    .unwrap_or(line_no);
                let text = slice_lines(content, first, last);
                let capture = |re: &Regex| {
                    re.captures(&text)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().to_string())
                };
                settings.push(Chunk::new(
                    ChunkKind::Setting,
                    path.to_string(),
                    first,
                    last,
                    text.clone(),
                    ChunkMetadata::from_source(ParseSource::Regex)
                        .setting(id.as_str())
                        .setting_type(capture(&TYPE))
                        .label(capture(&LABEL)),
                ));
            }

            if settings.is_empty() {
                chunks.push(Chunk::new(
                    ChunkKind::RawSchema,
                    path.to_string(),
                    block_first,
                    block_last,
                    block.as_str().to_string(),
                    ChunkMetadata::from_source(ParseSource::Regex),
                ));
            } else {
                chunks.extend(settings);
            }
        }

        for (idx, line) in lines.iter().enumerate() {
            for caps in RENDER_CALL.captures_iter(line) {
                let Some(target) = caps.get(1) else { continue };
                chunks.push(Chunk::new(
                    ChunkKind::Render,
                    path.to_string(),
                    idx + 1,
                    idx + 1,
                    (*line).to_string(),
                    ChunkMetadata::from_source(ParseSource::Regex).render_target(target.as_str()),
                ));
            }
        }

        Ok(chunks)
    }
}
