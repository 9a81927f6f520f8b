//! Chunk to feature conversion.

use crate::text::{slugify, tokenize};
use crate::types::Feature;
use std::collections::BTreeMap;
use theme_code_chunker::{Chunk, ChunkKind};

/// Stable slug for a chunk; falls back to the line range.
pub fn feature_slug(chunk: &Chunk) -> String {
    let prefix = match chunk.kind {
        ChunkKind::Setting => "setting",
        ChunkKind::Block => "block",
        ChunkKind::Preset => "preset",
        ChunkKind::Render => "render",
        ChunkKind::Conditional => "if",
        ChunkKind::Rule => "rule",
        ChunkKind::Function | ChunkKind::Class => "fn",
        ChunkKind::ConfigKey => "key",
        ChunkKind::RawSchema | ChunkKind::WholeFile => "",
    };
    let ident = chunk
        .identifier()
        .map(|ident| match chunk.kind {
            ChunkKind::Conditional => strip_keyword(ident),
            _ => ident,
        })
        .map(slugify)
        .unwrap_or_default();

    if prefix.is_empty() || ident.is_empty() {
        format!("lines-{}-{}", chunk.line_start, chunk.line_end)
    } else {
        format!("{prefix}-{ident}")
    }
}

fn strip_keyword(condition: &str) -> &str {
    for keyword in ["if ", "unless ", "case "] {
        if let Some(rest) = condition.strip_prefix(keyword) {
            return rest;
        }
    }
    condition
}

pub fn feature_description(chunk: &Chunk) -> String {
    let m = &chunk.metadata;
    let ident = chunk.identifier().unwrap_or("");
    match chunk.kind {
        ChunkKind::Setting => {
            let name = m.label.as_deref().unwrap_or(ident);
            let mut text = match &m.setting_type {
                Some(kind) => format!("{name} setting ({kind})"),
                None => format!("{name} setting"),
            };
            if let Some(block) = m.parent_scope.as_deref().and_then(|s| s.strip_prefix("block:")) {
                text.push_str(&format!(" in {block} block"));
            }
            text
        }
        ChunkKind::Block => format!("{} block", m.label.as_deref().unwrap_or(ident)),
        ChunkKind::Preset => format!("{ident} preset"),
        ChunkKind::RawSchema => match m.schema_name.as_deref() {
            Some(name) => format!("{name} schema"),
            None => "Section schema".to_string(),
        },
        ChunkKind::Render => format!("Renders snippet {ident}"),
        ChunkKind::Conditional => format!("Conditional {ident}"),
        ChunkKind::Rule => match &m.media {
            Some(media) => format!("Style rule {ident} within {media}"),
            None => format!("Style rule {ident}"),
        },
        ChunkKind::Function => match &m.parent_scope {
            Some(parent) => format!("Method {ident} of {parent}"),
            None => format!("Function {ident}"),
        },
        ChunkKind::Class => format!("Class {ident}"),
        ChunkKind::ConfigKey => format!("Config key {ident}"),
        ChunkKind::WholeFile => format!("Lines {}-{}", chunk.line_start, chunk.line_end),
    }
}

pub fn feature_keywords(chunk: &Chunk) -> Vec<String> {
    let m = &chunk.metadata;
    let mut source = String::new();
    for part in [
        chunk.identifier(),
        m.label.as_deref(),
        m.setting_type.as_deref(),
        m.parent_scope.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        source.push_str(part);
        source.push(' ');
    }
    for reference in &m.references {
        source.push_str(reference);
        source.push(' ');
    }

    let mut keywords = tokenize(&source);
    let kind_word = match chunk.kind {
        ChunkKind::Rule => Some("style"),
        ChunkKind::Setting => Some("setting"),
        ChunkKind::Block => Some("block"),
        ChunkKind::Function | ChunkKind::Class => Some("script"),
        ChunkKind::Render => Some("render"),
        _ => None,
    };
    if let Some(word) = kind_word {
        if !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }
    keywords
}

/// One feature per chunk, keyed by slug; repeated slugs get `-2`, `-3`, ...
pub fn extract_features(chunks: &[Chunk]) -> BTreeMap<String, Feature> {
    let mut features = BTreeMap::new();
    for chunk in chunks {
        let base = feature_slug(chunk);
        let mut slug = base.clone();
        let mut n = 2;
        while features.contains_key(&slug) {
            slug = format!("{base}-{n}");
            n += 1;
        }
        let feature = Feature::new(chunk.line_start, chunk.line_end, feature_description(chunk))
            .with_keywords(feature_keywords(chunk));
        features.insert(slug, feature);
    }
    features
}
