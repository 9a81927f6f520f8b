//! Query → target files and features.

use crate::text::tokenize;
use crate::types::{ThemeMap, ThemeMapFile};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const PATH_MENTION: f64 = 10.0;
const PURPOSE_TOKEN: f64 = 1.0;
const PATTERN_TOKEN: f64 = 0.5;
const FEATURE_KEYWORD: f64 = 2.0;
const FEATURE_DESCRIPTION: f64 = 3.0;
const INTENT_PATH: f64 = 2.0;
const INTENT_KEYWORD: f64 = 1.0;
/// Expanded synonyms count for this fraction of a literal token
const EXPANDED_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupOptions {
    pub top_n: usize,
    pub related_cap: usize,
    pub confidence_threshold: f64,
    pub expand_synonyms: bool,
    /// File currently open in the editor
    pub active_path: Option<String>,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            top_n: 5,
            related_cap: 8,
            confidence_threshold: 6.0,
            expand_synonyms: true,
            active_path: None,
        }
    }
}

/// What the user seems to want done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditIntent {
    Fixing,
    Removing,
    Adding,
    TextEditing,
    Styling,
}

struct IntentRule {
    intent: EditIntent,
    pattern: Regex,
    path_hints: &'static [&'static str],
    keyword_hints: &'static [&'static str],
}

static INTENTS: Lazy<Vec<IntentRule>> = Lazy::new(|| {
    let rule = |intent: EditIntent,
                pattern: &str,
                path_hints: &'static [&'static str],
                keyword_hints: &'static [&'static str]| IntentRule {
        intent,
        pattern: Regex::new(pattern).expect("valid intent regex"),
        path_hints,
        keyword_hints,
    };
    vec![
        rule(
            EditIntent::Fixing,
            r"(?i)\b(fix|bug|broken|error|issue|not working|doesn'?t work)\b",
            &[".js", ".ts"],
            &["script", "error"],
        ),
        rule(
            EditIntent::Removing,
            r"(?i)\b(remove|delete|hide|drop|get rid of)\b",
            &["sections/", "snippets/", "templates/"],
            &["render", "block"],
        ),
        rule(
            EditIntent::Adding,
            r"(?i)\b(add|create|new|insert)\b",
            &["sections/", "snippets/"],
            &["block", "setting", "render"],
        ),
        rule(
            EditIntent::TextEditing,
            r"(?i)\b(text|copy|wording|label|title|heading|translat\w*|rename)\b",
            &["locales/"],
            &["text", "heading", "title", "label", "richtext"],
        ),
        rule(
            EditIntent::Styling,
            r"(?i)\b(colou?rs?|fonts?|size|bigger|smaller|larger|spacing|padding|margin|styles?|css|align\w*|background|border|width|height)\b",
            &[".css", ".scss"],
            &["style", "color", "font", "size", "spacing", "padding", "margin", "width", "height", "background"],
        ),
    ]
});

/// First matching intent in priority order.
pub fn detect_intent(query: &str) -> Option<EditIntent> {
    INTENTS
        .iter()
        .find(|rule| rule.pattern.is_match(query))
        .map(|rule| rule.intent)
}

/// Fixed concept-synonym table for vague edit requests.
pub struct ConceptExpander {
    synonyms: HashMap<&'static str, &'static [&'static str]>,
}

impl ConceptExpander {
    pub fn new() -> Self {
        let mut synonyms: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        let size: &'static [&'static str] = &["size", "spacing", "padding", "width", "height", "font"];
        synonyms.insert("bigger", size);
        synonyms.insert("larger", size);
        synonyms.insert("smaller", size);
        synonyms.insert("wider", &["width", "max", "container"]);
        synonyms.insert("narrower", &["width", "max", "container"]);
        synonyms.insert("taller", &["height", "padding"]);
        synonyms.insert("shorter", &["height", "padding"]);
        synonyms.insert("colour", &["color", "background"]);
        synonyms.insert("color", &["background", "scheme"]);
        synonyms.insert("button", &["btn", "cta"]);
        synonyms.insert("logo", &["brand", "image"]);
        synonyms.insert("menu", &["nav", "navigation", "drawer"]);
        synonyms.insert("navigation", &["nav", "menu"]);
        synonyms.insert("price", &["money", "compare"]);
        synonyms.insert("image", &["img", "media", "picture"]);
        synonyms.insert("photo", &["image", "media"]);
        synonyms.insert("banner", &["hero", "slideshow", "image"]);
        synonyms.insert("hero", &["banner", "slideshow"]);
        synonyms.insert("font", &["typography", "heading", "body"]);
        synonyms.insert("text", &["heading", "richtext", "title"]);
        synonyms.insert("cart", &["drawer", "checkout"]);
        synonyms.insert("footer", &["bottom", "newsletter"]);
        synonyms.insert("header", &["nav", "logo", "menu"]);
        synonyms.insert("mobile", &["media", "breakpoint", "small"]);
        Self { synonyms }
    }

    /// Extra tokens for `tokens`, excluding tokens already present.
    pub fn expand(&self, tokens: &[String]) -> Vec<String> {
        let mut extra = Vec::new();
        for token in tokens {
            if let Some(words) = self.synonyms.get(token.as_str()) {
                for word in words.iter() {
                    let word = (*word).to_string();
                    if !tokens.contains(&word) && !extra.contains(&word) {
                        extra.push(word);
                    }
                }
            }
        }
        extra
    }
}

impl Default for ConceptExpander {
    fn default() -> Self {
        Self::new()
    }
}

static EXPANDER: Lazy<ConceptExpander> = Lazy::new(ConceptExpander::new);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedFeature {
    pub slug: String,
    pub lines: [usize; 2],
    pub description: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTarget {
    pub path: String,
    pub purpose: String,
    pub score: f64,
    pub features: Vec<MatchedFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub targets: Vec<LookupTarget>,
    /// Dependency neighbors of the targets that are not targets themselves
    pub related: Vec<String>,
    pub confident: bool,
    pub intent: Option<EditIntent>,
}

struct QueryTerms {
    lowered: String,
    /// (token, weight)
    tokens: Vec<(String, f64)>,
}

impl QueryTerms {
    fn new(query: &str, expand: bool) -> Self {
        let literal = tokenize(query);
        let mut tokens: Vec<(String, f64)> = literal.iter().map(|t| (t.clone(), 1.0)).collect();
        if expand {
            tokens.extend(
                EXPANDER
                    .expand(&literal)
                    .into_iter()
                    .map(|t| (t, EXPANDED_WEIGHT)),
            );
        }
        Self {
            lowered: query.to_lowercase(),
            tokens,
        }
    }

    fn overlap(&self, words: &HashSet<String>, per_token: f64) -> f64 {
        self.tokens
            .iter()
            .filter(|(token, _)| words.contains(token))
            .map(|(_, weight)| per_token * weight)
            .sum()
    }
}

fn words(texts: &[&str]) -> HashSet<String> {
    texts.iter().flat_map(|t| tokenize(t)).collect()
}

fn mentions_path(lowered_query: &str, file: &ThemeMapFile) -> bool {
    let path = file.path.to_lowercase();
    let basename = file.basename().to_lowercase();
    let stem = basename.split('.').next().unwrap_or(&basename);
    lowered_query.contains(&path)
        || lowered_query.contains(&basename)
        || (stem.len() >= 4 && contains_word(lowered_query, stem))
}

/// `needle` occurs in `haystack` not glued to other word characters.
fn contains_word(haystack: &str, needle: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '-' || c == '_';
    haystack.match_indices(needle).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + needle.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

fn score_file(
    terms: &QueryTerms,
    intent: Option<&IntentRule>,
    file: &ThemeMapFile,
) -> (f64, Vec<MatchedFeature>) {
    let mut score = 0.0;
    if mentions_path(&terms.lowered, file) {
        score += PATH_MENTION;
    }
    let summary = file.summary.as_deref().unwrap_or("");
    score += terms.overlap(&words(&[file.purpose.as_str(), summary]), PURPOSE_TOKEN);
    let pattern_refs: Vec<&str> = file.patterns.iter().map(String::as_str).collect();
    score += terms.overlap(&words(&pattern_refs), PATTERN_TOKEN);

    let mut matched = Vec::new();
    for (slug, feature) in &file.features {
        if feature.is_stale() {
            continue;
        }
        let keywords: HashSet<String> = feature.keywords.iter().cloned().collect();
        let feature_score = terms.overlap(&keywords, FEATURE_KEYWORD)
            + terms.overlap(&words(&[feature.description.as_str()]), FEATURE_DESCRIPTION);
        if feature_score > 0.0 {
            score += feature_score;
            matched.push(MatchedFeature {
                slug: slug.clone(),
                lines: feature.lines,
                description: feature.description.clone(),
                score: feature_score,
            });
        }
    }

    if score > 0.0 {
        if let Some(rule) = intent {
            if rule.path_hints.iter().any(|hint| file.path.contains(hint)) {
                score += INTENT_PATH;
            }
            let has_keyword = file.features.values().any(|f| {
                f.keywords
                    .iter()
                    .any(|k| rule.keyword_hints.contains(&k.as_str()))
            });
            if has_keyword {
                score += INTENT_KEYWORD;
            }
        }
    }

    matched.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.slug.cmp(&b.slug)));
    (score, matched)
}

/// Rank the map's files against `query`.
///
/// Deterministic for a given map and query: ties fall back to path order.
pub fn lookup(map: &ThemeMap, query: &str, options: &LookupOptions) -> LookupResult {
    let terms = QueryTerms::new(query, options.expand_synonyms);
    let intent = INTENTS.iter().find(|rule| rule.pattern.is_match(query));

    let mut scored: Vec<LookupTarget> = map
        .files
        .values()
        .filter_map(|file| {
            let (score, features) = score_file(&terms, intent, file);
            (score > 0.0).then(|| LookupTarget {
                path: file.path.clone(),
                purpose: file.purpose.clone(),
                score,
                features,
            })
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));

    if let Some(active) = options.active_path.as_deref() {
        if let Some(pos) = scored.iter().position(|t| t.path == active) {
            let target = scored.remove(pos);
            scored.insert(0, target);
        }
    }
    scored.truncate(options.top_n);

    let confident = scored
        .iter()
        .map(|t| t.score)
        .fold(0.0_f64, f64::max)
        >= options.confidence_threshold;

    let target_paths: HashSet<&str> = scored.iter().map(|t| t.path.as_str()).collect();
    let mut related: Vec<String> = Vec::new();
    'outer: for target in &scored {
        let Some(file) = map.file(&target.path) else {
            continue;
        };
        for neighbor in file.depends_on.iter().chain(file.rendered_by.iter()) {
            if related.len() >= options.related_cap {
                break 'outer;
            }
            if !target_paths.contains(neighbor.as_str()) && !related.contains(neighbor) {
                related.push(neighbor.clone());
            }
        }
    }

    LookupResult {
        targets: scored,
        related,
        confident,
        intent: intent.map(|rule| rule.intent),
    }
}
