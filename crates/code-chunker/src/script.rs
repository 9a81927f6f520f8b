//! Scripts: functions, classes and class methods.

use crate::error::{ChunkerError, Result};
use crate::lines::{balance_end, slice_lines};
use crate::strategy::ChunkStrategy;
use crate::types::{Chunk, ChunkKind, ChunkMetadata, ParseSource};
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Node, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    JavaScript,
    TypeScript,
    Tsx,
}

impl Dialect {
    fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".tsx") {
            Self::Tsx
        } else if lower.ends_with(".ts") || lower.ends_with(".mts") || lower.ends_with(".cts") {
            Self::TypeScript
        } else {
            Self::JavaScript
        }
    }

    fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Tree-sitter pass over JavaScript / TypeScript
pub struct ScriptGrammarStrategy;

impl ChunkStrategy for ScriptGrammarStrategy {
    fn name(&self) -> &'static str {
        "script-grammar"
    }

    fn chunk(&self, path: &str, content: &str) -> Result<Vec<Chunk>> {
        let mut parser = Parser::new();
        parser
            .set_language(&Dialect::from_path(path).tree_sitter_language())
            .map_err(|e| ChunkerError::tree_sitter(format!("Failed to set language: {e}")))?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| ChunkerError::parse("Failed to parse script"))?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(ChunkerError::parse("script contains syntax errors"));
        }

        let mut walker = ScriptWalker {
            path,
            content,
            chunks: Vec::new(),
        };
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            walker.visit_top_level(child);
        }
        Ok(walker.chunks)
    }
}

struct ScriptWalker<'a> {
    path: &'a str,
    content: &'a str,
    chunks: Vec<Chunk>,
}

impl<'a> ScriptWalker<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.content.as_bytes()).unwrap_or_default()
    }

    fn name_of(&self, node: Node) -> Option<String> {
        node.child_by_field_name("name")
            .map(|n| self.text(n).to_string())
    }

    fn push(&mut self, kind: ChunkKind, node: Node, metadata: ChunkMetadata) {
        let chunk = Chunk::new(
            kind,
            self.path.to_string(),
            node.start_position().row + 1,
            node.end_position().row + 1,
            self.text(node).to_string(),
            metadata,
        );
        self.chunks.push(chunk);
    }

    fn visit_top_level(&mut self, node: Node) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = self.name_of(node) {
                    self.push(
                        ChunkKind::Function,
                        node,
                        ChunkMetadata::from_source(ParseSource::Grammar).function_name(name),
                    );
                }
            }
            "class_declaration" | "abstract_class_declaration" => self.visit_class(node, None),
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                let declarators: Vec<_> = node
                    .children(&mut cursor)
                    .filter(|c| c.kind() == "variable_declarator")
                    .collect();
                for declarator in declarators {
                    let Some(value) = declarator.child_by_field_name("value") else {
                        continue;
                    };
                    let Some(name) = self.name_of(declarator) else {
                        continue;
                    };
                    match value.kind() {
                        "arrow_function" | "function_expression" | "function" => self.push(
                            ChunkKind::Function,
                            node,
                            ChunkMetadata::from_source(ParseSource::Grammar).function_name(name),
                        ),
                        "class" => self.visit_class(value, Some(name)),
                        _ => {}
                    }
                }
            }
            "export_statement" => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    self.visit_top_level(declaration);
                }
            }
            "expression_statement" => {
                let text = self.text(node);
                if text.starts_with("customElements.define") {
                    if let Some(tag) = CUSTOM_ELEMENT
                        .captures(text)
                        .and_then(|caps| caps.get(1))
                        .map(|m| m.as_str().to_string())
                    {
                        self.push(
                            ChunkKind::Class,
                            node,
                            ChunkMetadata::from_source(ParseSource::Grammar)
                                .function_name(tag.clone())
                                .add_reference(tag),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_class(&mut self, node: Node, binding: Option<String>) {
        let Some(class_name) = self.name_of(node).or(binding) else {
            return;
        };
        self.push(
            ChunkKind::Class,
            node,
            ChunkMetadata::from_source(ParseSource::Grammar).function_name(class_name.clone()),
        );
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        let methods: Vec<_> = body
            .children(&mut cursor)
            .filter(|c| c.kind() == "method_definition")
            .collect();
        for method in methods {
            if let Some(name) = self.name_of(method) {
                self.push(
                    ChunkKind::Function,
                    method,
                    ChunkMetadata::from_source(ParseSource::Grammar)
                        .function_name(name)
                        .parent_scope(Some(class_name.clone())),
                );
            }
        }
    }
}

static CUSTOM_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"customElements\.define\(\s*['"]([^'"]+)['"]"#).expect("valid custom element regex")
});
static FUNCTION_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+(?:default\s+)?)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)")
        .expect("valid function regex")
});
static ARROW_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>)",
    )
    .expect("valid arrow regex")
});
static CLASS_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+(?:default\s+)?)?class\s+([A-Za-z_$][\w$]*)")
        .expect("valid class regex")
});

/// Line-based approximation for scripts tree-sitter rejects.
pub struct ScriptRegexStrategy;

impl ChunkStrategy for ScriptRegexStrategy {
    fn name(&self) -> &'static str {
        "script-regex"
    }

    fn chunk(&self, path: &str, content: &str) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();
        let mut idx = 0;

        while idx < lines.len() {
            let line = lines[idx];
            let capture = |re: &Regex| {
                re.captures(line)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            };
            let found = capture(&CLASS_DECL)
                .map(|name| (ChunkKind::Class, name))
                .or_else(|| capture(&FUNCTION_DECL).map(|name| (ChunkKind::Function, name)))
                .or_else(|| capture(&ARROW_DECL).map(|name| (ChunkKind::Function, name)));
            let Some((kind, name)) = found else {
                idx += 1;
                continue;
            };
            let end = balance_end(&lines, idx);
            chunks.push(Chunk::new(
                kind,
                path.to_string(),
                idx + 1,
                end + 1,
                slice_lines(content, idx + 1, end + 1),
                ChunkMetadata::from_source(ParseSource::Regex).function_name(name),
            ));
            idx = end + 1;
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const JS: &str = r#"import { debounce } from './utils.js';

function onResize() {
  return window.innerWidth;
}

export const formatMoney = (cents) => {
  return (cents / 100).toFixed(2);
};

class CartDrawer extends HTMLElement {
  constructor() {
    super();
  }

  open() {
    this.classList.add('active');
  }
}

customElements.define('cart-drawer', CartDrawer);
"#;

    fn summarize(chunks: &[Chunk]) -> Vec<(ChunkKind, String, Option<String>, usize, usize)> {
        chunks
            .iter()
            .map(|c| {
                (
                    c.kind,
                    c.metadata.function_name.clone().unwrap_or_default(),
                    c.metadata.parent_scope.clone(),
                    c.line_start,
                    c.line_end,
                )
            })
            .collect()
    }

    #[test]
    fn test_grammar_extracts_functions_and_methods() {
        let chunks = ScriptGrammarStrategy.chunk("assets/cart.js", JS).unwrap();
        assert_eq!(
            summarize(&chunks),
            vec![
                (ChunkKind::Function, "onResize".into(), None, 3, 5),
                (ChunkKind::Function, "formatMoney".into(), None, 7, 9),
                (ChunkKind::Class, "CartDrawer".into(), None, 11, 19),
                (ChunkKind::Function, "constructor".into(), Some("CartDrawer".into()), 12, 14),
                (ChunkKind::Function, "open".into(), Some("CartDrawer".into()), 16, 18),
                (ChunkKind::Class, "cart-drawer".into(), None, 21, 21),
            ]
        );
        assert_eq!(chunks[5].metadata.references, vec!["cart-drawer".to_string()]);
    }

    #[test]
    fn test_grammar_handles_typescript() {
        let ts = "export function total(items: number[]): number {\n  return items.length;\n}\n";
        let chunks = ScriptGrammarStrategy.chunk("assets/total.ts", ts).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.function_name.as_deref(), Some("total"));
    }

    #[test]
    fn test_grammar_rejects_syntax_errors() {
        let broken = "function broken( {\n  return;\n";
        assert!(ScriptGrammarStrategy.chunk("assets/x.js", broken).is_err());
    }

    #[test]
    fn test_regex_approximation() {
        let chunks = ScriptRegexStrategy.chunk("assets/cart.js", JS).unwrap();
        assert_eq!(
            summarize(&chunks),
            vec![
                (ChunkKind::Function, "onResize".into(), None, 3, 5),
                (ChunkKind::Function, "formatMoney".into(), None, 7, 9),
                (ChunkKind::Class, "CartDrawer".into(), None, 11, 19),
            ]
        );
        assert!(chunks.iter().all(|c| c.metadata.source == ParseSource::Regex));
    }
}
