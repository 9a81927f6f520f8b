//! Span-aware JSON scanner.
//!
//! `serde_json` tells us what a document means but not where each value lives.
//! This scanner walks the same grammar and records byte spans so that settings,
//! blocks and top-level keys can be mapped back to line ranges. Values that are
//! needed as data are re-parsed from their span with `serde_json`.
//!
//! Block and line comments are skipped as whitespace; theme config files often
//! carry a generated header comment.

use crate::error::{ChunkerError, Result};
use serde_json::Value;

#[derive(Debug, Clone)]
pub(crate) struct JsonSpan {
    /// Byte offset of the first character of the value
    pub start: usize,
    /// Byte offset one past the last character of the value
    pub end: usize,
    pub node: JsonNode,
}

#[derive(Debug, Clone)]
pub(crate) enum JsonNode {
    Object(Vec<Member>),
    Array(Vec<JsonSpan>),
    String(String),
    Scalar,
}

#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub key: String,
    pub key_start: usize,
    pub value: JsonSpan,
}

impl JsonSpan {
    pub fn get(&self, key: &str) -> Option<&JsonSpan> {
        match &self.node {
            JsonNode::Object(members) => members.iter().find(|m| m.key == key).map(|m| &m.value),
            _ => None,
        }
    }

    pub fn members(&self) -> &[Member] {
        match &self.node {
            JsonNode::Object(members) => members,
            _ => &[],
        }
    }

    pub fn items(&self) -> &[JsonSpan] {
        match &self.node {
            JsonNode::Array(items) => items,
            _ => &[],
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.node {
            JsonNode::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.node, JsonNode::Object(_))
    }

    /// String value of `key`, if present and a string.
    pub fn str_field(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Self::as_str).map(str::to_string)
    }

    /// Parse the raw text of this span into a `serde_json::Value`.
    pub fn to_value(&self, text: &str) -> Result<Value> {
        let raw = text
            .get(self.start..self.end)
            .ok_or_else(|| ChunkerError::malformed_json(self.start, "span out of bounds"))?;
        Ok(serde_json::from_str(raw)?)
    }
}

/// Scan a complete JSON document. Trailing non-whitespace is an error.
pub(crate) fn scan(text: &str) -> Result<JsonSpan> {
    let mut scanner = Scanner {
        bytes: text.as_bytes(),
        text,
        pos: 0,
        depth: 0,
    };
    scanner.skip_trivia()?;
    let root = scanner.value()?;
    scanner.skip_trivia()?;
    if scanner.pos < scanner.bytes.len() {
        return Err(ChunkerError::malformed_json(
            scanner.pos,
            "trailing characters after document",
        ));
    }
    Ok(root)
}

const MAX_DEPTH: usize = 128;

struct Scanner<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
    depth: usize,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, msg: &str) -> ChunkerError {
        ChunkerError::malformed_json(self.pos, msg)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\n' | b'\r') => self.pos += 1,
                Some(b'/') => match self.bytes.get(self.pos + 1) {
                    Some(b'*') => {
                        let rest = &self.text[self.pos + 2..];
                        let close = rest
                            .find("*/")
                            .ok_or_else(|| self.error("unterminated comment"))?;
                        self.pos += 2 + close + 2;
                    }
                    Some(b'/') => {
                        let rest = &self.text[self.pos..];
                        self.pos += rest.find('\n').unwrap_or(rest.len());
                    }
                    _ => return Err(self.error("unexpected '/'")),
                },
                _ => return Ok(()),
            }
        }
    }

    fn value(&mut self) -> Result<JsonSpan> {
        match self.peek() {
            Some(b'{') => self.object(),
            Some(b'[') => self.array(),
            Some(b'"') => {
                let start = self.pos;
                let s = self.string()?;
                Ok(JsonSpan {
                    start,
                    end: self.pos,
                    node: JsonNode::String(s),
                })
            }
            Some(b't') => self.literal("true"),
            Some(b'f') => self.literal("false"),
            Some(b'n') => self.literal("null"),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        Ok(())
    }

    fn object(&mut self) -> Result<JsonSpan> {
        self.enter()?;
        let start = self.pos;
        self.pos += 1;
        let mut members = Vec::new();
        self.skip_trivia()?;
        if self.peek() == Some(b'}') {
            self.pos += 1;
        } else {
            loop {
                self.skip_trivia()?;
                if self.peek() != Some(b'"') {
                    return Err(self.error("expected object key"));
                }
                let key_start = self.pos;
                let key = self.string()?;
                self.skip_trivia()?;
                if self.peek() != Some(b':') {
                    return Err(self.error("expected ':'"));
                }
                self.pos += 1;
                self.skip_trivia()?;
                let value = self.value()?;
                members.push(Member {
                    key,
                    key_start,
                    value,
                });
                self.skip_trivia()?;
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b'}') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or '}'")),
                }
            }
        }
        self.depth -= 1;
        Ok(JsonSpan {
            start,
            end: self.pos,
            node: JsonNode::Object(members),
        })
    }

    fn array(&mut self) -> Result<JsonSpan> {
        self.enter()?;
        let start = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_trivia()?;
        if self.peek() == Some(b']') {
            self.pos += 1;
        } else {
            loop {
                self.skip_trivia()?;
                items.push(self.value()?);
                self.skip_trivia()?;
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b']') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ']'")),
                }
            }
        }
        self.depth -= 1;
        Ok(JsonSpan {
            start,
            end: self.pos,
            node: JsonNode::Array(items),
        })
    }

    fn string(&mut self) -> Result<String> {
        // Opening quote
        self.pos += 1;
        let mut out = String::new();
        loop {
            let rest = &self.text[self.pos..];
            let stop = rest
                .find(['"', '\\'])
                .ok_or_else(|| self.error("unterminated string"))?;
            out.push_str(&rest[..stop]);
            self.pos += stop;
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    let escaped = self
                        .bytes
                        .get(self.pos + 1)
                        .copied()
                        .ok_or_else(|| self.error("unterminated escape"))?;
                    self.pos += 2;
                    match escaped {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'n' => out.push('\n'),
                        b't' => out.push('\t'),
                        b'r' => out.push('\r'),
                        b'b' => out.push('\u{8}'),
                        b'f' => out.push('\u{c}'),
                        b'u' => {
                            let hex = self
                                .text
                                .get(self.pos..self.pos + 4)
                                .ok_or_else(|| self.error("short unicode escape"))?;
                            let code = u32::from_str_radix(hex, 16)
                                .map_err(|_| self.error("invalid unicode escape"))?;
                            out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                            self.pos += 4;
                        }
                        _ => return Err(self.error("invalid escape")),
                    }
                }
                _ => return Err(self.error("unterminated string")),
            }
        }
    }

    fn literal(&mut self, word: &str) -> Result<JsonSpan> {
        let start = self.pos;
        if self.text[self.pos..].starts_with(word) {
            self.pos += word.len();
            Ok(JsonSpan {
                start,
                end: self.pos,
                node: JsonNode::Scalar,
            })
        } else {
            Err(self.error("invalid literal"))
        }
    }

    fn number(&mut self) -> Result<JsonSpan> {
        let start = self.pos;
        while let Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
        self.text[start..self.pos]
            .parse::<f64>()
            .map_err(|_| ChunkerError::malformed_json(start, "invalid number"))?;
        Ok(JsonSpan {
            start,
            end: self.pos,
            node: JsonNode::Scalar,
        })
    }
}
