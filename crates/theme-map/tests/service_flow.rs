use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use theme_code_chunker::Chunker;
use theme_map::{
    FileSummary, FsThemeMapStore, IndexerConfig, LineEdit, LookupOptions, MapStatus,
    MemoryThemeMapStore, Result, SchedulerConfig, Summarizer, SummaryRequest, ThemeMapCache,
    ThemeMapIndexer, ThemeMapService, ThemeMapStore,
};
use theme_protocol::FileRecord;

const HEADER: &str = r#"<header class="header">
  {% render 'icon-cart' %}
</header>
{% schema %}
{
  "name": "Header",
  "settings": [
    {
      "type": "image_picker",
      "id": "logo",
      "label": "Logo"
    },
    {
      "type": "range",
      "id": "logo_width",
      "label": "Logo width"
    }
  ]
}
{% endschema %}
"#;

fn theme() -> Vec<FileRecord> {
    vec![
        FileRecord::new("1", "layout/theme.liquid", "{% section 'header' %}\n{{ content_for_layout }}\n"),
        FileRecord::new("2", "sections/header.liquid", HEADER),
        FileRecord::new("3", "snippets/icon-cart.liquid", "<svg class=\"icon icon-cart\"></svg>\n"),
        FileRecord::new("4", "sections/footer.liquid", "<footer>{{ 'footer' | t }}</footer>\n"),
        FileRecord::new("5", "assets/base.css", ".header { display: flex; }\n.footer { padding: 0; }\n"),
    ]
}

fn service(store: Arc<dyn ThemeMapStore>) -> ThemeMapService {
    let indexer =
        ThemeMapIndexer::new(IndexerConfig::default(), Arc::new(Chunker::default())).unwrap();
    ThemeMapService::new(
        indexer,
        store,
        Arc::new(ThemeMapCache::default()),
        // Long enough that the tests drive flushes explicitly
        SchedulerConfig {
            debounce: Duration::from_secs(30),
            max_batch_wait: Duration::from_secs(60),
        },
    )
}

#[tokio::test]
async fn basename_query_ranks_first_and_confident() {
    let service = service(Arc::new(MemoryThemeMapStore::new()));
    service.rebuild("shop", &theme()).await.unwrap();

    let result = service
        .lookup("shop", "footer.liquid", &LookupOptions::default())
        .await
        .unwrap();
    assert_eq!(result.targets[0].path, "sections/footer.liquid");
    assert!(result.confident);
}

#[tokio::test]
async fn identical_reindex_keeps_version() {
    let store = Arc::new(MemoryThemeMapStore::new());
    let service = service(store.clone());
    let built = service.rebuild("shop", &theme()).await.unwrap();

    let edited = FileRecord::new("5", "assets/base.css", ".header { display: grid; }\n");
    let first = service.reindex_now("shop", &[edited.clone()]).await.unwrap();
    assert_eq!(first.version, built.version + 1);
    let saves = store.save_count();

    let second = service.reindex_now("shop", &[edited]).await.unwrap();
    assert_eq!(second.version, first.version);
    assert_eq!(store.save_count(), saves);
}

#[tokio::test]
async fn edit_repairs_lines_then_flush_refreshes() {
    let service = service(Arc::new(MemoryThemeMapStore::new()));
    service.rebuild("shop", &theme()).await.unwrap();
    let before = service.load("shop").await.unwrap().unwrap();
    let logo = before.file("sections/header.liquid").unwrap().features["setting-logo"].lines;

    // Two lines inserted at the top of the file
    let edited = FileRecord::new("2", "sections/header.liquid", format!("{{% comment %}}\n{{% endcomment %}}\n{HEADER}"));
    service
        .record_edit("shop", edited, Some(LineEdit::insert_before(1, 2)))
        .await
        .unwrap();

    let repaired = service.load("shop").await.unwrap().unwrap();
    assert_eq!(
        repaired.file("sections/header.liquid").unwrap().features["setting-logo"].lines,
        [logo[0] + 2, logo[1] + 2]
    );

    let report = service.flush("shop").await.unwrap();
    assert_eq!(report.flushed, vec!["sections/header.liquid"]);
    let refreshed = service.load("shop").await.unwrap().unwrap();
    assert_eq!(
        refreshed.file("sections/header.liquid").unwrap().features["setting-logo"].lines,
        [logo[0] + 2, logo[1] + 2]
    );
    assert!(refreshed.version > repaired.version);
    assert_eq!(refreshed.status, MapStatus::Ready);
    service.shutdown().await;
}

#[tokio::test]
async fn replaced_span_marks_feature_stale_until_reindex() {
    let service = service(Arc::new(MemoryThemeMapStore::new()));
    service.rebuild("shop", &theme()).await.unwrap();
    let before = service.load("shop").await.unwrap().unwrap();
    let [start, end] = before.file("sections/header.liquid").unwrap().features["setting-logo"].lines;

    let edited = FileRecord::new("2", "sections/header.liquid", HEADER.replace("\"Logo\"", "\"Brand\""));
    service
        .record_edit("shop", edited, Some(LineEdit::replace(start, end, end - start + 1)))
        .await
        .unwrap();
    let stale = service.load("shop").await.unwrap().unwrap();
    assert!(stale.file("sections/header.liquid").unwrap().features["setting-logo"].is_stale());
    assert_eq!(stale.status, MapStatus::Stale);

    service.flush("shop").await.unwrap();
    let fresh = service.load("shop").await.unwrap().unwrap();
    assert_eq!(
        fresh.file("sections/header.liquid").unwrap().features["setting-logo"].lines,
        [start, end]
    );
    assert_eq!(fresh.status, MapStatus::Ready);
    service.shutdown().await;
}

#[tokio::test]
async fn edit_reverted_within_window_still_reindexes() {
    let service = service(Arc::new(MemoryThemeMapStore::new()));
    service.rebuild("shop", &theme()).await.unwrap();
    let before = service.load("shop").await.unwrap().unwrap();
    let [start, end] = before.file("sections/header.liquid").unwrap().features["setting-logo"].lines;

    let edited = FileRecord::new("2", "sections/header.liquid", HEADER.replace("\"Logo\"", "\"Brand\""));
    service
        .record_edit("shop", edited, Some(LineEdit::replace(start, end, end - start + 1)))
        .await
        .unwrap();
    let reverted = FileRecord::new("2", "sections/header.liquid", HEADER);
    service.record_edit("shop", reverted, None).await.unwrap();

    let report = service.flush("shop").await.unwrap();
    assert_eq!(report.flushed, vec!["sections/header.liquid"]);
    assert!(report.skipped_unchanged.is_empty());

    let fresh = service.load("shop").await.unwrap().unwrap();
    assert_eq!(
        fresh.file("sections/header.liquid").unwrap().features["setting-logo"].lines,
        [start, end]
    );
    assert_eq!(fresh.status, MapStatus::Ready);
    service.shutdown().await;
}

#[tokio::test]
async fn shifted_lines_are_restored_after_revert() {
    let service = service(Arc::new(MemoryThemeMapStore::new()));
    service.rebuild("shop", &theme()).await.unwrap();
    let before = service.load("shop").await.unwrap().unwrap();
    let logo = before.file("sections/header.liquid").unwrap().features["setting-logo"].lines;

    let edited = FileRecord::new("2", "sections/header.liquid", format!("{{% comment %}}\n{{% endcomment %}}\n{HEADER}"));
    service
        .record_edit("shop", edited, Some(LineEdit::insert_before(1, 2)))
        .await
        .unwrap();
    service
        .record_edit("shop", FileRecord::new("2", "sections/header.liquid", HEADER), None)
        .await
        .unwrap();

    assert_eq!(service.flush("shop").await.unwrap().flushed, vec!["sections/header.liquid"]);
    let fresh = service.load("shop").await.unwrap().unwrap();
    assert_eq!(
        fresh.file("sections/header.liquid").unwrap().features["setting-logo"].lines,
        logo
    );
    service.shutdown().await;
}

struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, batch: &[SummaryRequest]) -> Result<Vec<FileSummary>> {
        Ok(batch
            .iter()
            .map(|r| FileSummary {
                path: r.path.clone(),
                summary: format!("{} with {} features", r.purpose, r.features.len()),
            })
            .collect())
    }
}

#[tokio::test]
async fn enrichment_survives_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let files = theme();
    {
        let service = service(Arc::new(FsThemeMapStore::new(dir.path())));
        service.rebuild("shop", &files).await.unwrap();
        let report = service.enrich("shop", &files, &EchoSummarizer).await.unwrap();
        assert_eq!(report.requested, files.len());
        assert_eq!(report.applied, files.len());
    }

    let cold = service(Arc::new(FsThemeMapStore::new(dir.path())));
    let map = cold.load("shop").await.unwrap().unwrap();
    assert_eq!(map.status, MapStatus::Ready);
    assert!(map.files.values().all(|f| f.has_fresh_summary()));

    // Rebuilding unchanged content keeps the summaries
    let rebuilt = cold.rebuild("shop", &files).await.unwrap();
    assert!(rebuilt.files.values().all(|f| f.has_fresh_summary()));
    let report = cold.enrich("shop", &files, &EchoSummarizer).await.unwrap();
    assert_eq!(report.requested, 0);
}
