use async_trait::async_trait;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashMap;
use theme_context::{estimate_tokens, ContextEngine, EngineRegistry, SelectionRequest};
use theme_protocol::{FileContentLoader, FileRecord, LoaderError};
use theme_search::{HitSource, SearchHit};

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn two_files_over_budget_keeps_the_first() {
    let files = vec![
        FileRecord::new("A", "sections/a.liquid", "a".repeat(2400)),
        FileRecord::new("B", "sections/b.liquid", "b".repeat(2800)),
    ];
    let engine = ContextEngine::from_files(&files);
    let bundle = engine.build_context(&[], &ids(&["A", "B"]), 1000);

    assert_eq!(bundle.file_ids(), vec!["A"]);
    assert_eq!(bundle.used_tokens, 600);
    assert_eq!(bundle.excluded, ids(&["B"]));
    assert_eq!(bundle.remaining_tokens(), 400);
}

#[test]
fn hybrid_hits_follow_fuzzy_matches() {
    let files = vec![
        FileRecord::new("1", "sections/footer.liquid", "<footer></footer>"),
        FileRecord::new("2", "snippets/social-icons.liquid", "<ul class=\"social\"></ul>"),
    ];
    let engine = ContextEngine::from_files(&files);
    let hit = SearchHit {
        file_id: "2".to_string(),
        path: "snippets/social-icons.liquid".to_string(),
        score: 0.4,
        sources: vec![HitSource::Keyword],
    };
    let request = SelectionRequest::new("footer", 10_000).with_hybrid_hits(vec![hit]);
    let bundle = engine.select_relevant_files(&request);
    assert_eq!(bundle.file_ids(), vec!["1", "2"]);
}

struct MapLoader(HashMap<String, String>);

#[async_trait]
impl FileContentLoader for MapLoader {
    async fn load_content(&self, ids: &[String]) -> Result<Vec<FileRecord>, LoaderError> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                let (path, content) = self.0.get(id)?.split_once('|')?;
                Some(FileRecord::new(id.clone(), path, content))
            })
            .collect())
    }
}

#[tokio::test]
async fn stubs_are_hydrated_before_inclusion() {
    let files = vec![
        FileRecord::new("1", "sections/header.liquid", ""),
        FileRecord::new("2", "snippets/icon-cart.liquid", ""),
    ];
    let loader = MapLoader(HashMap::from([
        (
            "1".to_string(),
            "sections/header.liquid|<header>{% render 'icon-cart' %}</header>".to_string(),
        ),
        ("2".to_string(), "snippets/icon-cart.liquid|<svg></svg>".to_string()),
    ]));

    let registry = EngineRegistry::default();
    let engine = registry.get_or_index("shop", &files);
    let mut engine = engine.write().await;
    let request = SelectionRequest::new("header", 10_000);
    let bundle = engine
        .select_relevant_files_hydrated(&request, &loader)
        .await
        .unwrap();

    assert_eq!(bundle.files[0].path, "sections/header.liquid");
    assert!(bundle.files.iter().all(|f| !f.is_stub()));
    // The icon only shows up once the header content is known
    assert!(bundle.file_ids().contains(&"2"));
}

fn sized_files() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(1usize..4000, 1..12)
}

proptest! {
    #[test]
    fn prop_budget_is_never_exceeded(sizes in sized_files(), budget in 0usize..3000) {
        let files: Vec<FileRecord> = sizes
            .iter()
            .enumerate()
            .map(|(i, len)| FileRecord::new(format!("f{i}"), format!("snippets/f{i}.liquid"), "x".repeat(*len)))
            .collect();
        let engine = ContextEngine::from_files(&files);
        let order: Vec<String> = files.iter().map(|f| f.id.clone()).collect();
        let bundle = engine.build_context(&[], &order, budget);

        let used: usize = bundle.files.iter().map(|f| estimate_tokens(&f.content)).sum();
        prop_assert_eq!(used, bundle.used_tokens);
        prop_assert!(used <= budget);
        prop_assert_eq!(bundle.files.len() + bundle.excluded.len(), files.len());

        // Included files form a prefix; the first excluded one did not fit
        let included: Vec<String> = bundle.files.iter().map(|f| f.id.clone()).collect();
        prop_assert_eq!(&included[..], &order[..included.len()]);
        if let Some(first) = bundle.excluded.first() {
            let next = files.iter().find(|f| &f.id == first).map(|f| estimate_tokens(&f.content));
            prop_assert!(used + next.unwrap_or(0) > budget);
        }
    }

    #[test]
    fn prop_closure_contains_known_targets(
        edges in proptest::collection::vec((0usize..8, 0usize..10), 0..20),
        seeds in proptest::collection::vec(0usize..8, 1..4),
    ) {
        let mut content: Vec<String> = vec![String::new(); 8];
        for (from, to) in &edges {
            content[*from].push_str(&format!("{{% render 's{to}' %}}\n"));
        }
        let files: Vec<FileRecord> = content
            .iter()
            .enumerate()
            .map(|(i, c)| FileRecord::new(format!("{i}"), format!("snippets/s{i}.liquid"), c.clone()))
            .collect();
        let engine = ContextEngine::from_files(&files);
        let seeds: Vec<String> = seeds.iter().map(|s| s.to_string()).collect();
        let closure = engine.resolve_with_dependencies(&seeds);

        for id in &closure {
            let meta = engine.metadata(id).unwrap();
            for target in &meta.references {
                if let Some(target_id) = engine.id_for_path(target) {
                    prop_assert!(closure.iter().any(|c| c == target_id));
                }
            }
        }
        for seed in &seeds {
            prop_assert!(closure.contains(seed));
        }
    }
}
