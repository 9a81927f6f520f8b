use crate::bundle::ContextBundle;
use crate::error::Result;
use crate::metadata::FileMetadata;
use crate::topics::{TopicTable, BUILTIN};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use theme_protocol::{FileContentLoader, FileRecord, FileType};
use theme_search::{query_terms, SearchHit};

const EXACT_NAME_BOOST: f32 = 10.0;
const LEARNED_BOOST: f32 = 6.0;
const PATH_SEGMENT_BOOST: f32 = 5.0;
const FILENAME_SUBSTRING_BOOST: f32 = 3.0;
const TYPE_INTENT_BOOST: f32 = 3.0;
const RECENCY_BOOST: f32 = 1.0;

const CLOSURE_CACHE_CAPACITY: usize = 64;
const MAX_HYDRATION_ROUNDS: usize = 3;
pub const DEFAULT_TOP_N: usize = 8;

/// Words that never count as a match on their own
const NOISE_WORDS: &[&str] = &[
    "the", "and", "for", "with", "make", "please", "can", "you", "change", "update", "this",
    "that", "into", "from", "fix", "add", "remove", "want",
];

/// Words hinting at the kind of file the user is after
const TYPE_HINTS: &[(FileType, &[&str])] = &[
    (
        FileType::Style,
        &["css", "scss", "style", "styles", "styling", "color", "colour", "font", "padding", "margin", "spacing"],
    ),
    (
        FileType::Script,
        &["js", "javascript", "script", "click", "toggle", "event", "listener"],
    ),
    (
        FileType::Template,
        &["liquid", "section", "snippet", "template", "markup", "html", "layout"],
    ),
    (
        FileType::Config,
        &["json", "setting", "settings", "config", "schema", "locale", "translation"],
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyMatch {
    pub id: String,
    pub path: String,
    pub score: f32,
}

/// Inputs of one relevance-driven selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub query: String,
    /// File the user currently has open
    pub active_path: Option<String>,
    pub budget: usize,
    pub top_n: usize,
    /// Extra candidates appended after the fuzzy matches
    pub hybrid_hits: Vec<SearchHit>,
}

impl SelectionRequest {
    pub fn new(query: impl Into<String>, budget: usize) -> Self {
        Self {
            query: query.into(),
            active_path: None,
            budget,
            top_n: DEFAULT_TOP_N,
            hybrid_hits: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_active_path(mut self, path: impl Into<String>) -> Self {
        self.active_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    #[must_use]
    pub fn with_hybrid_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.hybrid_hits = hits;
        self
    }
}

/// Live index over one project's in-memory file set.
pub struct ContextEngine {
    files: BTreeMap<String, FileRecord>,
    metadata: BTreeMap<String, FileMetadata>,
    by_path: HashMap<String, String>,
    learned: HashMap<String, BTreeSet<String>>,
    topics: Arc<TopicTable>,
    closures: Mutex<LruCache<String, Arc<Vec<String>>>>,
}

impl Default for ContextEngine {
    fn default() -> Self {
        Self::with_topics(Arc::clone(&BUILTIN))
    }
}

impl ContextEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topics(topics: Arc<TopicTable>) -> Self {
        let capacity = NonZeroUsize::new(CLOSURE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            files: BTreeMap::new(),
            metadata: BTreeMap::new(),
            by_path: HashMap::new(),
            learned: HashMap::new(),
            topics,
            closures: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn from_files(files: &[FileRecord]) -> Self {
        let mut engine = Self::new();
        engine.index(files);
        engine
    }

    fn closures(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<Vec<String>>>> {
        self.closures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Replace the whole file set.
    pub fn index(&mut self, files: &[FileRecord]) {
        self.files.clear();
        self.metadata.clear();
        self.by_path.clear();
        for file in files {
            self.insert(file.clone());
        }
        self.closures().clear();
        log::debug!("Context engine indexed {} files", self.files.len());
    }

    /// Add or replace one file.
    pub fn update_file(&mut self, file: FileRecord) {
        if let Some(old) = self.metadata.get(&file.id) {
            if old.path != file.path {
                self.by_path.remove(&old.path);
            }
        }
        self.insert(file);
        self.closures().clear();
    }

    pub fn remove_file(&mut self, id: &str) -> bool {
        let Some(meta) = self.metadata.remove(id) else {
            return false;
        };
        self.files.remove(id);
        self.by_path.remove(&meta.path);
        self.closures().clear();
        true
    }

    fn insert(&mut self, file: FileRecord) {
        let meta = FileMetadata::from_record(&file);
        self.by_path.insert(meta.path.clone(), meta.id.clone());
        self.metadata.insert(meta.id.clone(), meta);
        self.files.insert(file.id.clone(), file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, id: &str) -> Option<&FileRecord> {
        self.files.get(id)
    }

    pub fn metadata(&self, id: &str) -> Option<&FileMetadata> {
        self.metadata.get(id)
    }

    pub fn id_for_path(&self, path: &str) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    pub fn all_metadata(&self) -> impl Iterator<Item = &FileMetadata> {
        self.metadata.values()
    }

    /// Remember that `term` resolved to `path` for later queries.
    pub fn learn_term(&mut self, term: &str, path: &str) {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return;
        }
        self.learned
            .entry(term)
            .or_default()
            .insert(path.to_string());
    }

    fn terms(query: &str) -> Vec<String> {
        query_terms(query)
            .into_iter()
            .filter(|t| !NOISE_WORDS.contains(&t.as_str()))
            .collect()
    }

    /// Score every file against the query; ties broken by path.
    pub fn fuzzy_match(&self, query: &str, top_n: usize) -> Vec<FuzzyMatch> {
        let query_lower = query.to_lowercase();
        let terms = Self::terms(query);
        if terms.is_empty() && query_lower.trim().is_empty() {
            return Vec::new();
        }
        let intents: HashSet<FileType> = TYPE_HINTS
            .iter()
            .filter(|(_, words)| terms.iter().any(|t| words.contains(&t.as_str())))
            .map(|(file_type, _)| *file_type)
            .collect();
        let most_recent = self.metadata.values().filter_map(|m| m.updated_at).max();

        let mut matches: Vec<FuzzyMatch> = self
            .metadata
            .values()
            .filter_map(|meta| {
                let mut score = self.score(&query_lower, &terms, meta);
                if score <= 0.0 {
                    return None;
                }
                if intents.contains(&meta.file_type) {
                    score += TYPE_INTENT_BOOST;
                }
                if most_recent.is_some() && meta.updated_at == most_recent {
                    score += RECENCY_BOOST;
                }
                Some(FuzzyMatch {
                    id: meta.id.clone(),
                    path: meta.path.clone(),
                    score,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });
        matches.truncate(top_n);
        matches
    }

    /// Name, topic, learned, segment and substring signals. Type intent and
    /// recency only break ties between files that already match.
    fn score(&self, query_lower: &str, terms: &[String], meta: &FileMetadata) -> f32 {
        let name = meta.name.to_lowercase();
        let stem = name.rsplit_once('.').map_or(name.as_str(), |(stem, _)| stem);
        let mut score = 0.0;

        if query_lower.contains(&name) || terms.iter().any(|t| t == stem) {
            score += EXACT_NAME_BOOST;
        }
        if let Some(boost) = self.topics.boost(terms, &meta.path) {
            score += boost;
        }
        if terms.iter().any(|t| {
            self.learned
                .get(t)
                .is_some_and(|paths| paths.contains(&meta.path))
        }) {
            score += LEARNED_BOOST;
        }

        let path_lower = meta.path.to_lowercase();
        let segments: HashSet<&str> = path_lower
            .split(|c: char| matches!(c, '/' | '-' | '_' | '.'))
            .filter(|s| !s.is_empty())
            .collect();
        for term in terms {
            if segments.contains(term.as_str()) {
                score += PATH_SEGMENT_BOOST;
            }
            if name.contains(term.as_str()) {
                score += FILENAME_SUBSTRING_BOOST;
            }
        }
        score
    }

    /// Ids of files whose full path or file name appears in the query.
    pub fn explicit_mentions(&self, query: &str) -> Vec<String> {
        let query_lower = query.to_lowercase();
        self.metadata
            .values()
            .filter(|m| {
                query_lower.contains(&m.path.to_lowercase())
                    || (m.name.contains('.') && query_lower.contains(&m.name.to_lowercase()))
            })
            .map(|m| m.id.clone())
            .collect()
    }

    /// Files matching a topic triggered by the query, strongest topic first.
    pub fn topic_matches(&self, query: &str, limit: usize) -> Vec<String> {
        let terms = Self::terms(query);
        let mut scored: Vec<(&FileMetadata, f32)> = self
            .metadata
            .values()
            .filter_map(|m| self.topics.boost(&terms, &m.path).map(|b| (m, b)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.path.cmp(&b.0.path))
        });
        scored
            .into_iter()
            .take(limit)
            .map(|(m, _)| m.id.clone())
            .collect()
    }

    /// Seeds plus every file reachable through references, breadth first.
    ///
    /// Unknown seeds are ignored. Results are cached by the sorted seed set.
    pub fn resolve_with_dependencies(&self, ids: &[String]) -> Vec<String> {
        let mut seeds: Vec<&str> = ids
            .iter()
            .map(String::as_str)
            .filter(|id| self.metadata.contains_key(*id))
            .collect();
        seeds.sort_unstable();
        seeds.dedup();
        let key = seeds.join("\u{1f}");

        if let Some(hit) = self.closures().get(&key) {
            return hit.as_ref().clone();
        }

        let mut visited: HashSet<&str> = seeds.iter().copied().collect();
        let mut queue: VecDeque<&str> = seeds.iter().copied().collect();
        let mut out: Vec<String> = Vec::new();
        while let Some(id) = queue.pop_front() {
            out.push(id.to_string());
            let Some(meta) = self.metadata.get(id) else {
                continue;
            };
            for target in &meta.references {
                if let Some(next) = self.by_path.get(target) {
                    if visited.insert(next.as_str()) {
                        queue.push_back(next.as_str());
                    }
                }
            }
        }

        self.closures().put(key, Arc::new(out.clone()));
        out
    }

    /// Priority, then requested, then their dependencies; deduplicated.
    fn candidate_order(&self, requested: &[String], priority: &[String]) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for id in priority.iter().chain(requested) {
            if seen.insert(id.clone()) {
                order.push(id.clone());
            }
        }
        for id in self.resolve_with_dependencies(&order) {
            if seen.insert(id.clone()) {
                order.push(id);
            }
        }
        order
    }

    /// Greedy, order-preserving context assembly under a token budget.
    ///
    /// Files are taken in candidate order while they fit. The first file that
    /// would overflow the budget is excluded and so is everything after it.
    pub fn build_context(
        &self,
        requested: &[String],
        priority: &[String],
        budget: usize,
    ) -> ContextBundle {
        let mut bundle = ContextBundle::new(budget);
        let mut overflowed = false;

        for id in self.candidate_order(requested, priority) {
            let (Some(file), Some(meta)) = (self.files.get(&id), self.metadata.get(&id)) else {
                bundle.missing.push(id);
                continue;
            };
            if overflowed || bundle.used_tokens + meta.token_estimate > budget {
                if !overflowed {
                    log::debug!(
                        "Context budget reached at {} ({} + {} > {budget})",
                        meta.path,
                        bundle.used_tokens,
                        meta.token_estimate
                    );
                }
                overflowed = true;
                bundle.excluded.push(id);
                continue;
            }
            bundle.used_tokens += meta.token_estimate;
            bundle.files.push(file.clone());
        }
        bundle
    }

    /// Priority and requested id lists for a selection request.
    pub fn selection_order(&self, request: &SelectionRequest) -> (Vec<String>, Vec<String>) {
        let mut priority = self.explicit_mentions(&request.query);
        if let Some(active) = request
            .active_path
            .as_deref()
            .and_then(|path| self.id_for_path(path))
        {
            priority.push(active.to_string());
        }
        priority.extend(self.topic_matches(&request.query, request.top_n));

        let mut requested: Vec<String> = self
            .fuzzy_match(&request.query, request.top_n)
            .into_iter()
            .map(|m| m.id)
            .collect();
        requested.extend(
            request
                .hybrid_hits
                .iter()
                .filter(|hit| self.metadata.contains_key(&hit.file_id))
                .map(|hit| hit.file_id.clone()),
        );
        (priority, requested)
    }

    /// Mentions, active file and topic matches as priority; fuzzy matches and
    /// hybrid hits as requested.
    pub fn select_relevant_files(&self, request: &SelectionRequest) -> ContextBundle {
        let (priority, requested) = self.selection_order(request);
        self.build_context(&requested, &priority, request.budget)
    }

    /// Like [`Self::select_relevant_files`], hydrating stub candidates first.
    pub async fn select_relevant_files_hydrated(
        &mut self,
        request: &SelectionRequest,
        loader: &dyn FileContentLoader,
    ) -> Result<ContextBundle> {
        let (priority, requested) = self.selection_order(request);

        for _ in 0..MAX_HYDRATION_ROUNDS {
            let stubs: Vec<String> = self
                .candidate_order(&requested, &priority)
                .into_iter()
                .filter(|id| self.files.get(id).is_some_and(FileRecord::is_stub))
                .collect();
            if stubs.is_empty() {
                break;
            }
            let loaded = loader.load_content(&stubs).await?;
            let mut hydrated = 0usize;
            for file in loaded {
                if self.files.contains_key(&file.id) && !file.is_stub() {
                    self.update_file(file);
                    hydrated += 1;
                }
            }
            log::debug!("Hydrated {hydrated}/{} stub files", stubs.len());
            if hydrated == 0 {
                break;
            }
        }

        Ok(self.build_context(&requested, &priority, request.budget))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    fn theme() -> Vec<FileRecord> {
        vec![
            FileRecord::new("1", "layout/theme.liquid", "{% section 'header' %}{% section 'footer' %}"),
            FileRecord::new("2", "sections/header.liquid", "{% render 'icon-cart' %}{{ 'header.css' | asset_url }}"),
            FileRecord::new("3", "snippets/icon-cart.liquid", "<svg></svg>"),
            FileRecord::new("4", "assets/header.css", ".header { display: flex; }"),
            FileRecord::new("5", "sections/footer.liquid", "<footer></footer>"),
            FileRecord::new("6", "sections/main-product.liquid", "{% render 'price' %}"),
        ]
    }

    #[test]
    fn test_exact_name_ranks_first() {
        let engine = ContextEngine::from_files(&theme());
        let matches = engine.fuzzy_match("footer", 3);
        assert_eq!(matches[0].path, "sections/footer.liquid");
        // 10 exact + 10 topic + 5 segment + 3 substring
        assert!((matches[0].score - 28.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_ties_break_by_path() {
        let engine = ContextEngine::from_files(&theme());
        let matches = engine.fuzzy_match("cart", 5);
        let paths: Vec<_> = matches.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["snippets/icon-cart.liquid"]);

        let matches = engine.fuzzy_match("liquid", 10);
        let paths: Vec<_> = matches.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "layout/theme.liquid",
                "sections/footer.liquid",
                "sections/header.liquid",
                "sections/main-product.liquid",
                "snippets/icon-cart.liquid",
            ]
        );
    }

    #[test]
    fn test_type_intent_and_recency_boost() {
        let files: Vec<FileRecord> = theme()
            .into_iter()
            .map(|f| {
                let at = if f.id == "2" { 20 } else { 10 };
                f.with_updated_at(at)
            })
            .collect();
        let engine = ContextEngine::from_files(&files);
        let matches = engine.fuzzy_match("header css", 2);
        assert_eq!(matches[0].path, "assets/header.css");
        assert_eq!(matches[1].path, "sections/header.liquid");

        let header = engine.fuzzy_match("header", 2);
        // Same signals, recency decides
        assert_eq!(header[0].path, "sections/header.liquid");
        assert!((header[0].score - header[1].score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_learned_terms_boost() {
        let mut engine = ContextEngine::from_files(&theme());
        assert!(engine.fuzzy_match("pdp", 3).iter().all(|m| m.id != "3"));
        engine.learn_term("PDP", "snippets/icon-cart.liquid");
        let matches = engine.fuzzy_match("pdp", 3);
        assert!(matches.iter().any(|m| m.id == "3" && (m.score - 6.0).abs() < f32::EPSILON));
    }

    #[test]
    fn test_dependency_closure_is_transitive_and_cached() {
        let engine = ContextEngine::from_files(&theme());
        let closure = engine.resolve_with_dependencies(&ids(&["1"]));
        assert_eq!(closure, ids(&["1", "2", "5", "3", "4"]));
        assert_eq!(engine.resolve_with_dependencies(&ids(&["1", "1"])), closure);
        assert_eq!(engine.closures().len(), 1);
        assert!(engine.resolve_with_dependencies(&ids(&["missing"])).is_empty());
    }

    #[test]
    fn test_budget_stops_at_first_overflow() {
        let files = vec![
            FileRecord::new("a", "snippets/a.liquid", "x".repeat(2400)),
            FileRecord::new("b", "snippets/b.liquid", "x".repeat(2800)),
            FileRecord::new("c", "snippets/c.liquid", "x".repeat(40)),
        ];
        let engine = ContextEngine::from_files(&files);
        let bundle = engine.build_context(&ids(&["c"]), &ids(&["a", "b"]), 1000);
        assert_eq!(bundle.used_tokens, 600);
        assert_eq!(bundle.file_ids(), vec!["a"]);
        // c would fit, but the budget is consumed in order
        assert_eq!(bundle.excluded, ids(&["b", "c"]));
    }

    #[test]
    fn test_unknown_ids_are_reported_missing() {
        let engine = ContextEngine::from_files(&theme());
        let bundle = engine.build_context(&ids(&["nope", "5"]), &[], 10_000);
        assert_eq!(bundle.file_ids(), vec!["5"]);
        assert_eq!(bundle.missing, ids(&["nope"]));
    }

    #[test]
    fn test_selection_order() {
        let engine = ContextEngine::from_files(&theme());
        let request = SelectionRequest::new("move the logo in header.liquid", 10_000)
            .with_active_path("sections/footer.liquid");
        let (priority, _) = engine.selection_order(&request);
        assert_eq!(priority[..2].to_vec(), ids(&["2", "5"]));

        let bundle = engine.select_relevant_files(&request);
        assert_eq!(bundle.files[0].path, "sections/header.liquid");
        assert_eq!(bundle.files[1].path, "sections/footer.liquid");
        // Dependencies of the header come along
        assert!(bundle.file_ids().contains(&"3"));
    }

    #[test]
    fn test_update_and_remove_invalidate_closure() {
        let mut engine = ContextEngine::from_files(&theme());
        assert_eq!(engine.resolve_with_dependencies(&ids(&["5"])), ids(&["5"]));
        engine.update_file(FileRecord::new("5", "sections/footer.liquid", "{% render 'icon-cart' %}"));
        assert_eq!(engine.resolve_with_dependencies(&ids(&["5"])), ids(&["5", "3"]));
        assert!(engine.remove_file("3"));
        assert_eq!(engine.resolve_with_dependencies(&ids(&["5"])), ids(&["5"]));
        assert!(!engine.remove_file("3"));
    }
}
