//! Naming conventions and framework detection.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use theme_code_chunker::{Chunk, ChunkKind};
use theme_protocol::FileRecord;

pub const PATTERN_BEM: &str = "bem-naming";
pub const PATTERN_CUSTOM_ELEMENTS: &str = "custom-elements";
pub const PATTERN_SECTION_SCHEMA: &str = "section-schema";
pub const PATTERN_CUSTOM_PROPERTIES: &str = "css-custom-properties";
pub const PATTERN_JSON_TEMPLATES: &str = "json-templates";

static CLASS_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.([a-zA-Z][a-zA-Z0-9]*)(?:__|--|-)").expect("valid class prefix regex"));
static BEM_SELECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[a-zA-Z][\w-]*(?:__[\w-]+|--[\w-]+)").expect("valid bem regex"));
static CUSTOM_PROPERTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*--[a-zA-Z][\w-]*\s*:").expect("valid custom property regex"));

/// Per-file conventions derived from its chunks.
///
/// A class-name prefix shared by at least `min_rules` rules becomes
/// `prefix-<name>`.
pub fn file_patterns(file: &FileRecord, chunks: &[Chunk], min_rules: usize) -> Vec<String> {
    let mut patterns = BTreeSet::new();

    let mut prefixes: BTreeMap<String, usize> = BTreeMap::new();
    let mut bem = 0usize;
    for chunk in chunks.iter().filter(|c| c.kind == ChunkKind::Rule) {
        let Some(selector) = chunk.metadata.selector.as_deref() else {
            continue;
        };
        let mut seen = BTreeSet::new();
        for caps in CLASS_PREFIX.captures_iter(selector) {
            let prefix = caps[1].to_ascii_lowercase();
            if seen.insert(prefix.clone()) {
                *prefixes.entry(prefix).or_default() += 1;
            }
        }
        if BEM_SELECTOR.is_match(selector) {
            bem += 1;
        }
    }
    for (prefix, count) in prefixes {
        if count >= min_rules {
            patterns.insert(format!("prefix-{prefix}"));
        }
    }
    if bem >= min_rules {
        patterns.insert(PATTERN_BEM.to_string());
    }

    if chunks.iter().any(|c| c.kind.is_schema()) {
        patterns.insert(PATTERN_SECTION_SCHEMA.to_string());
    }
    if file.content.contains("customElements.define") {
        patterns.insert(PATTERN_CUSTOM_ELEMENTS.to_string());
    }
    if CUSTOM_PROPERTY.is_match(&file.content) {
        patterns.insert(PATTERN_CUSTOM_PROPERTIES.to_string());
    }
    patterns.into_iter().collect()
}

/// Patterns corroborated by enough files to call them project conventions.
pub fn global_patterns<'a>(
    per_file: impl IntoIterator<Item = (&'a str, &'a [String])>,
) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut json_templates = 0usize;
    for (path, patterns) in per_file {
        if path.starts_with("templates/") && path.ends_with(".json") {
            json_templates += 1;
        }
        for pattern in patterns {
            *counts.entry(pattern.as_str()).or_default() += 1;
        }
    }

    let mut global = Vec::new();
    for (pattern, min_files) in [
        (PATTERN_BEM, 3),
        (PATTERN_CUSTOM_ELEMENTS, 2),
        (PATTERN_SECTION_SCHEMA, 3),
        (PATTERN_CUSTOM_PROPERTIES, 3),
    ] {
        if counts.get(pattern).copied().unwrap_or(0) >= min_files {
            global.push(pattern.to_string());
        }
    }
    if json_templates >= 3 {
        global.push(PATTERN_JSON_TEMPLATES.to_string());
    }
    global.sort();
    global
}

enum Signal {
    Path(&'static str),
    Content(&'static str),
}

struct FrameworkSignature {
    name: &'static str,
    min_signals: usize,
    signals: &'static [Signal],
}

const FRAMEWORKS: &[FrameworkSignature] = &[
    FrameworkSignature {
        name: "dawn",
        min_signals: 3,
        signals: &[
            Signal::Path("assets/global.js"),
            Signal::Path("assets/base.css"),
            Signal::Path("sections/main-product.liquid"),
            Signal::Path("snippets/card-product.liquid"),
            Signal::Content("class=\"page-width"),
            Signal::Content("<details-disclosure"),
        ],
    },
    FrameworkSignature {
        name: "tailwind",
        min_signals: 2,
        signals: &[
            Signal::Path("tailwind.config.js"),
            Signal::Content("@tailwind"),
            Signal::Content("@apply "),
            Signal::Content("class=\"flex "),
        ],
    },
    FrameworkSignature {
        name: "bootstrap",
        min_signals: 2,
        signals: &[
            Signal::Path("bootstrap"),
            Signal::Content("class=\"container"),
            Signal::Content("class=\"row"),
            Signal::Content("col-md-"),
        ],
    },
    FrameworkSignature {
        name: "alpine",
        min_signals: 2,
        signals: &[
            Signal::Path("alpine"),
            Signal::Content("x-data="),
            Signal::Content("x-show="),
            Signal::Content("@click="),
        ],
    },
];

/// Best-corroborated framework, if any reaches its signal minimum.
///
/// Each signal counts once no matter how many files show it. Ties go to the
/// earlier table entry.
pub fn detect_framework<F: Borrow<FileRecord>>(files: &[F]) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for framework in FRAMEWORKS {
        let matched = framework
            .signals
            .iter()
            .filter(|signal| match signal {
                Signal::Path(needle) => files.iter().any(|f| f.borrow().path.contains(needle)),
                Signal::Content(needle) => {
                    files.iter().any(|f| f.borrow().content.contains(needle))
                }
            })
            .count();
        if matched < framework.min_signals {
            continue;
        }
        if best.map_or(true, |(_, count)| matched > count) {
            best = Some((framework.name, matched));
        }
    }
    if let Some((name, count)) = best {
        log::debug!("Detected framework {name} ({count} signals)");
    }
    best.map(|(name, _)| name.to_string())
}
