use crate::types::{by_score_then_path, HitSource, SearchHit};
use once_cell::sync::Lazy;
use regex::Regex;
use theme_protocol::FileRecord;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").expect("valid word regex"));

const CONTENT_WEIGHT: f32 = 2.0;
const NAME_WEIGHT: f32 = 5.0;

/// Lowercase query words, deduplicated, single characters dropped.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for m in WORD_RE.find_iter(query) {
        let term = m.as_str().to_lowercase();
        if term.len() < 2 || terms.contains(&term) {
            continue;
        }
        terms.push(term);
    }
    terms
}

/// Score one file against the query terms, in `[0, 1]`.
///
/// Each term contributes 2 when found in the content and 5 when found in the
/// file name; the sum is divided by the best possible score.
pub fn keyword_score(terms: &[String], file: &FileRecord) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let name = file.name.to_lowercase();
    let content = file.content.to_lowercase();

    let mut raw = 0.0;
    for term in terms {
        if content.contains(term.as_str()) {
            raw += CONTENT_WEIGHT;
        }
        if name.contains(term.as_str()) {
            raw += NAME_WEIGHT;
        }
    }
    raw / ((CONTENT_WEIGHT + NAME_WEIGHT) * terms.len() as f32)
}

/// Rank files by keyword score. Files that match nothing are left out.
pub fn keyword_search(query: &str, files: &[FileRecord], limit: usize) -> Vec<SearchHit> {
    let terms = query_terms(query);
    if terms.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = files
        .iter()
        .filter_map(|file| {
            let score = keyword_score(&terms, file);
            (score > 0.0).then(|| SearchHit {
                file_id: file.id.clone(),
                path: file.path.clone(),
                score,
                sources: vec![HitSource::Keyword],
            })
        })
        .collect();

    hits.sort_by(by_score_then_path);
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_query_terms() {
        assert_eq!(query_terms("Cart drawer, cart-DRAWER x"), vec!["cart", "drawer"]);
    }

    #[test]
    fn test_name_hits_outweigh_content_hits() {
        let files = vec![
            FileRecord::new("1", "snippets/price.liquid", "{{ product.price | money }}"),
            FileRecord::new("2", "sections/cart-drawer.liquid", "<cart-drawer></cart-drawer>"),
            FileRecord::new("3", "assets/base.css", ".price { color: red; }"),
        ];
        let hits = keyword_search("cart", &files, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "sections/cart-drawer.liquid");
        assert!((hits[0].score - 1.0).abs() < f32::EPSILON);

        let hits = keyword_search("price", &files, 10);
        let paths: Vec<_> = hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["snippets/price.liquid", "assets/base.css"]);
        assert!(hits.iter().all(|h| h.score > 0.0 && h.score <= 1.0));
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let files = vec![FileRecord::new("1", "a.css", "a")];
        assert!(keyword_search("  ?! ", &files, 5).is_empty());
    }
}
