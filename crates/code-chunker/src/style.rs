//! Style sheets: one chunk per rule, tagged with the enclosing media query.

use crate::error::{ChunkerError, Result};
use crate::lines::{balance_end, slice_lines, squash_whitespace, LineIndex};
use crate::strategy::ChunkStrategy;
use crate::types::{Chunk, ChunkKind, ChunkMetadata, ParseSource};
use once_cell::sync::Lazy;
use regex::Regex;

/// At-rules whose body holds further rules rather than declarations.
const CONTAINER_AT_RULES: &[&str] = &["@media", "@supports", "@container", "@layer", "@document"];

fn is_container(prelude: &str) -> bool {
    CONTAINER_AT_RULES.iter().any(|at| {
        prelude
            .strip_prefix(at)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '(']))
    })
}

fn allows_line_comments(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".scss") || lower.ends_with(".sass")
}

/// `//` after a URL scheme (`url(http://...)`) is not a comment.
fn starts_line_comment(prev: u8) -> bool {
    matches!(prev, b' ' | b'\t' | b'\n' | b'\r' | b';' | b'{' | b'}')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RuleSpan {
    pub selector: String,
    pub media: Option<String>,
    pub start: usize,
    pub end: usize,
}

struct Frame {
    prelude: String,
    start: usize,
    container: bool,
}

/// Comment- and string-aware brace scanner.
///
/// Emits every rule whose ancestors are all container at-rules. Rules nested
/// inside other rules (SCSS nesting) stay part of their parent.
pub(crate) fn scan_rules(content: &str, line_comments: bool) -> Result<Vec<RuleSpan>> {
    let bytes = content.as_bytes();
    let mut stack: Vec<Frame> = Vec::new();
    let mut rules = Vec::new();
    let mut prelude_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let close = content[i + 2..]
                    .find("*/")
                    .ok_or_else(|| ChunkerError::parse(format!("unterminated comment at byte {i}")))?;
                let after = i + 2 + close + 2;
                if content[prelude_start..i].trim().is_empty() {
                    prelude_start = after;
                }
                i = after;
            }
            b'/' if line_comments
                && bytes.get(i + 1) == Some(&b'/')
                && (i == 0 || starts_line_comment(bytes[i - 1])) =>
            {
                let after = content[i..].find('\n').map_or(bytes.len(), |n| i + n);
                if content[prelude_start..i].trim().is_empty() {
                    prelude_start = after;
                }
                i = after;
            }
            quote @ (b'"' | b'\'') => {
                let mut j = i + 1;
                loop {
                    match bytes.get(j) {
                        Some(b'\\') => j += 2,
                        Some(b) if *b == quote => break,
                        Some(_) => j += 1,
                        None => {
                            return Err(ChunkerError::parse(format!(
                                "unterminated string at byte {i}"
                            )))
                        }
                    }
                }
                i = j + 1;
            }
            // SCSS interpolation `#{...}` is not a block
            b'{' if i > 0 && bytes[i - 1] == b'#' => {
                let close = content[i..]
                    .find('}')
                    .ok_or_else(|| ChunkerError::parse("unterminated interpolation"))?;
                i += close + 1;
            }
            b'{' => {
                let raw = &content[prelude_start..i];
                let lead = raw.len() - raw.trim_start().len();
                let prelude = squash_whitespace(raw);
                stack.push(Frame {
                    container: is_container(&prelude),
                    prelude,
                    start: prelude_start + lead,
                });
                prelude_start = i + 1;
                i += 1;
            }
            b'}' => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| ChunkerError::parse(format!("unbalanced '}}' at byte {i}")))?;
                if !frame.container && stack.iter().all(|f| f.container) {
                    rules.push(RuleSpan {
                        selector: frame.prelude,
                        media: stack.last().map(|f| f.prelude.clone()),
                        start: frame.start,
                        end: i + 1,
                    });
                }
                prelude_start = i + 1;
                i += 1;
            }
            b';' => {
                prelude_start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    if let Some(frame) = stack.last() {
        return Err(ChunkerError::parse(format!(
            "unclosed block `{}` at byte {}",
            frame.prelude, frame.start
        )));
    }
    Ok(rules)
}

/// Grammar-aware pass over CSS / SCSS
pub struct StyleGrammarStrategy {
    pub scss_line_comments: bool,
}

impl ChunkStrategy for StyleGrammarStrategy {
    fn name(&self) -> &'static str {
        "style-grammar"
    }

    fn chunk(&self, path: &str, content: &str) -> Result<Vec<Chunk>> {
        let line_comments = self.scss_line_comments && allows_line_comments(path);
        let index = LineIndex::new(content);
        Ok(scan_rules(content, line_comments)?
            .into_iter()
            .filter(|rule| !rule.selector.is_empty())
            .map(|rule| {
                let (line_start, line_end) = index.span_lines(rule.start, rule.end);
                Chunk::new(
                    ChunkKind::Rule,
                    path.to_string(),
                    line_start,
                    line_end,
                    content[rule.start..rule.end].to_string(),
                    ChunkMetadata::from_source(ParseSource::Grammar)
                        .selector(rule.selector)
                        .media(rule.media),
                )
            })
            .collect())
    }
}

static RULE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([^\s{}/;][^{};]*?)\s*\{").expect("valid rule regex"));

/// Line-based approximation: a rule starts on a line ending its prelude with
/// `{` and runs until the braces balance again.
pub struct StyleRegexStrategy;

impl ChunkStrategy for StyleRegexStrategy {
    fn name(&self) -> &'static str {
        "style-regex"
    }

    fn chunk(&self, path: &str, content: &str) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();
        let mut media: Option<(String, usize)> = None;
        let mut idx = 0;

        while idx < lines.len() {
            if media.as_ref().is_some_and(|(_, until)| idx > *until) {
                media = None;
            }
            let Some(prelude) = RULE_START
                .captures(lines[idx])
                .and_then(|caps| caps.get(1))
                .map(|m| squash_whitespace(m.as_str()))
            else {
                idx += 1;
                continue;
            };
            let end = balance_end(&lines, idx);
            if is_container(&prelude) {
                media = Some((prelude, end));
                idx += 1;
                continue;
            }
            chunks.push(Chunk::new(
                ChunkKind::Rule,
                path.to_string(),
                idx + 1,
                end + 1,
                slice_lines(content, idx + 1, end + 1),
                ChunkMetadata::from_source(ParseSource::Regex)
                    .selector(prelude)
                    .media(media.as_ref().map(|(m, _)| m.clone())),
            ));
            idx = end + 1;
        }
        Ok(chunks)
    }
}
