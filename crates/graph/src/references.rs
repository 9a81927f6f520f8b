//! Outgoing reference detection per file type.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use theme_protocol::FileType;

/// How one file points at another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `{% render 'x' %}` / `{% include 'x' %}`
    Render,
    /// `{% section 'x' %}`
    Section,
    /// `{% sections 'x' %}` (section group)
    SectionGroup,
    /// `'x' | asset_url`
    Asset,
    /// `"type": "x"` in a JSON template or section group
    SectionType,
    StyleImport,
    ScriptImport,
}

impl ReferenceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Section => "section",
            Self::SectionGroup => "section_group",
            Self::Asset => "asset",
            Self::SectionType => "section_type",
            Self::StyleImport => "style_import",
            Self::ScriptImport => "script_import",
        }
    }
}

/// A reference as written in the source, before resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub target: String,
    /// 1-based line of the reference
    pub line: usize,
}

static LIQUID_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:\{%-?\s*|^\s*)(render|include|sections|section)\s+['"]([^'"]+)['"]"#)
        .expect("valid liquid call regex")
});
static ASSET_FILTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"['"]([^'"{}]+)['"]\s*\|\s*(?:asset_url|asset_img_url)"#)
        .expect("valid asset filter regex")
});
static SECTION_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""type"\s*:\s*"([^"@]+)""#).expect("valid section type regex"));
static CSS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@(?:import|use|forward)\s+(?:url\()?\s*['"]?([^'")\s;]+)"#)
        .expect("valid css import regex")
});
static JS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:\bfrom\s+|\bimport\s*\(\s*|\bimport\s+|\brequire\s*\(\s*)['"]([^'"]+)['"]"#)
        .expect("valid js import regex")
});

/// Only JSON templates and section groups declare section types.
fn declares_section_types(path: &str) -> bool {
    path.starts_with("templates/") || path.starts_with("sections/")
}

/// Extract outgoing references in source order.
pub fn extract_references(file_type: FileType, path: &str, content: &str) -> Vec<Reference> {
    let mut refs = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let mut push = |kind, target: &str| {
            refs.push(Reference {
                kind,
                target: target.to_string(),
                line: line_no,
            });
        };

        match file_type {
            FileType::Template => {
                for caps in LIQUID_CALL.captures_iter(line) {
                    let kind = match &caps[1] {
                        "render" | "include" => ReferenceKind::Render,
                        "section" => ReferenceKind::Section,
                        _ => ReferenceKind::SectionGroup,
                    };
                    push(kind, &caps[2]);
                }
                for caps in ASSET_FILTER.captures_iter(line) {
                    push(ReferenceKind::Asset, &caps[1]);
                }
            }
            FileType::Style => {
                for caps in CSS_IMPORT.captures_iter(line) {
                    push(ReferenceKind::StyleImport, &caps[1]);
                }
                // `.css.liquid` assets may use asset_url too
                for caps in ASSET_FILTER.captures_iter(line) {
                    push(ReferenceKind::Asset, &caps[1]);
                }
            }
            FileType::Script => {
                for caps in JS_IMPORT.captures_iter(line) {
                    push(ReferenceKind::ScriptImport, &caps[1]);
                }
            }
            FileType::Config if declares_section_types(path) => {
                for caps in SECTION_TYPE.captures_iter(line) {
                    push(ReferenceKind::SectionType, &caps[1]);
                }
            }
            FileType::Config | FileType::Other => {}
        }
    }
    refs
}

/// Project-relative path a reference points at, if it can be resolved.
///
/// Bare package imports and absolute URLs resolve to nothing.
pub fn resolve_reference(reference: &Reference, from_path: &str) -> Option<String> {
    let target = reference.target.trim();
    if target.is_empty() || target.contains("://") || target.starts_with("//") {
        return None;
    }
    match reference.kind {
        ReferenceKind::Render => Some(format!("snippets/{target}.liquid")),
        ReferenceKind::Section | ReferenceKind::SectionType => {
            Some(format!("sections/{target}.liquid"))
        }
        ReferenceKind::SectionGroup => Some(format!("sections/{target}.json")),
        ReferenceKind::Asset => Some(format!("assets/{target}")),
        ReferenceKind::StyleImport | ReferenceKind::ScriptImport => {
            resolve_relative(target, from_path)
        }
    }
}

fn resolve_relative(target: &str, from_path: &str) -> Option<String> {
    if !(target.starts_with("./") || target.starts_with("../")) {
        // Sass partials and plain css imports resolve next to the importer.
        if target.contains('/') || !target.contains('.') {
            return None;
        }
    }

    let mut parts: Vec<&str> = from_path.split('/').collect();
    parts.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    let mut resolved = parts.join("/");

    let file_name = resolved.rsplit('/').next().unwrap_or(&resolved);
    if !file_name.contains('.') {
        if let Some((_, ext)) = from_path.rsplit_once('.') {
            resolved = format!("{resolved}.{ext}");
        }
    }
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn targets(refs: &[Reference]) -> Vec<(ReferenceKind, &str, usize)> {
        refs.iter()
            .map(|r| (r.kind, r.target.as_str(), r.line))
            .collect()
    }

    #[test]
    fn test_template_references() {
        let content = "{% render 'icon-cart' %}\n{%- include \"price\" -%}\n{% section 'header' %}{% sections 'footer-group' %}\n{{ 'base.css' | asset_url | stylesheet_tag }}\n{% liquid\n  render 'badge'\n%}";
        let refs = extract_references(FileType::Template, "layout/theme.liquid", content);
        assert_eq!(
            targets(&refs),
            vec![
                (ReferenceKind::Render, "icon-cart", 1),
                (ReferenceKind::Render, "price", 2),
                (ReferenceKind::Section, "header", 3),
                (ReferenceKind::SectionGroup, "footer-group", 3),
                (ReferenceKind::Asset, "base.css", 4),
                (ReferenceKind::Render, "badge", 6),
            ]
        );
    }

    #[test]
    fn test_section_types_only_in_templates() {
        let content = "{\n  \"sections\": { \"main\": { \"type\": \"main-product\" }, \"app\": { \"type\": \"@app\" } }\n}";
        let refs = extract_references(FileType::Config, "templates/product.json", content);
        assert_eq!(targets(&refs), vec![(ReferenceKind::SectionType, "main-product", 2)]);

        let settings = extract_references(FileType::Config, "config/settings_data.json", content);
        assert!(settings.is_empty());
    }

    #[test]
    fn test_script_and_style_imports() {
        let js = "import { a } from './utils.js';\nconst b = await import('./lazy');\nimport 'lodash';";
        let refs = extract_references(FileType::Script, "assets/global.js", js);
        let resolved: Vec<_> = refs
            .iter()
            .map(|r| resolve_reference(r, "assets/global.js"))
            .collect();
        assert_eq!(
            resolved,
            vec![
                Some("assets/utils.js".to_string()),
                Some("assets/lazy.js".to_string()),
                None,
            ]
        );

        let css = "@import url('fonts.css');\n@use '../base/mixins';";
        let refs = extract_references(FileType::Style, "assets/theme.scss", css);
        let resolved: Vec<_> = refs
            .iter()
            .map(|r| resolve_reference(r, "assets/theme.scss"))
            .collect();
        assert_eq!(
            resolved,
            vec![
                Some("assets/fonts.css".to_string()),
                Some("base/mixins.scss".to_string()),
            ]
        );
    }

    #[test]
    fn test_resolve_theme_paths() {
        let reference = |kind| Reference {
            kind,
            target: "x".to_string(),
            line: 1,
        };
        assert_eq!(
            resolve_reference(&reference(ReferenceKind::Render), "sections/a.liquid").as_deref(),
            Some("snippets/x.liquid")
        );
        assert_eq!(
            resolve_reference(&reference(ReferenceKind::SectionType), "templates/a.json").as_deref(),
            Some("sections/x.liquid")
        );
        assert_eq!(
            resolve_reference(&reference(ReferenceKind::SectionGroup), "layout/theme.liquid")
                .as_deref(),
            Some("sections/x.json")
        );
        let escaping = Reference {
            kind: ReferenceKind::ScriptImport,
            target: "../../../x.js".to_string(),
            line: 1,
        };
        assert_eq!(resolve_reference(&escaping, "assets/a.js"), None);
    }
}
