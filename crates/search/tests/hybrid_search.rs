use pretty_assertions::assert_eq;
use std::sync::Arc;
use theme_protocol::FileRecord;
use theme_search::{
    keyword_search, HitSource, HybridConfig, HybridSearch, InMemoryVectorIndex, StubEmbedder,
    VectorSearch,
};

fn theme() -> Vec<FileRecord> {
    let mut files = vec![
        FileRecord::new("hdr", "sections/header.liquid", "<header>{% render 'cart-icon' %}</header>"),
        FileRecord::new("ftr", "sections/footer.liquid", "<footer>newsletter</footer>"),
        FileRecord::new("css", "assets/base.css", ".header { display: flex; }"),
        FileRecord::new("js", "assets/cart.js", "class CartDrawer extends HTMLElement {}"),
    ];
    for i in 0..12 {
        files.push(FileRecord::new(
            format!("s{i}"),
            format!("snippets/header-part-{i}.liquid"),
            "<div class=\"header__item\"></div>",
        ));
    }
    files
}

async fn indexed() -> Arc<InMemoryVectorIndex<StubEmbedder>> {
    let index = Arc::new(InMemoryVectorIndex::new(StubEmbedder::default()));
    index.index_files(&theme()).await.unwrap();
    index
}

#[tokio::test]
async fn disabled_vector_search_returns_keyword_ranking() {
    let files = theme();
    let vector: Arc<dyn VectorSearch> = indexed().await;
    let search = HybridSearch::new(HybridConfig::keyword_only(), Some(vector));

    let hits = search.search("header", &files, 10).await.unwrap();
    assert_eq!(hits, keyword_search("header", &files, 10));
    assert_eq!(hits.len(), 10);
    assert!(hits.iter().all(|h| h.sources == vec![HitSource::Keyword]));
}

#[tokio::test]
async fn empty_index_is_treated_as_unavailable() {
    let files = theme();
    let empty: Arc<dyn VectorSearch> = Arc::new(InMemoryVectorIndex::new(StubEmbedder::default()));
    let search = HybridSearch::new(HybridConfig::default(), Some(empty));

    let hits = search.search("cart", &files, 10).await.unwrap();
    assert_eq!(hits, keyword_search("cart", &files, 10));
}

#[tokio::test]
async fn stub_index_contributes_vector_hits() {
    let files = theme();
    let vector: Arc<dyn VectorSearch> = indexed().await;
    let search = HybridSearch::new(HybridConfig::default(), Some(vector));

    let hits = search.search("newsletter footer", &files, 5).await.unwrap();
    assert_eq!(hits[0].path, "sections/footer.liquid");
    assert_eq!(hits[0].sources, vec![HitSource::Keyword, HitSource::Vector]);
    assert!(hits.len() <= 5);
}
