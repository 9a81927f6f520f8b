use anyhow::{bail, Context as AnyhowContext, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use theme_code_chunker::{Chunk, Chunker};
use theme_context::{estimate_tokens, ContextEngine, SelectionRequest};
use theme_coordinator::{PolicyConfig, PolicyThresholds, StrategyTier};
use theme_map::{
    FsThemeMapStore, IndexerConfig, LookupOptions, LookupResult, MapStatus, SchedulerConfig,
    ThemeMapCache, ThemeMapIndexer, ThemeMapService, ThemeScanner,
};
use theme_protocol::FileRecord;
use theme_search::{HybridConfig, HybridSearch, InMemoryVectorIndex, SearchHit, StubEmbedder};

/// Directory under the theme root holding persisted maps
const MAP_DIR: &str = ".theme-map";
const DEFAULT_PROJECT: &str = "theme";

#[derive(Debug, Serialize)]
pub struct IndexSummary {
    pub root: PathBuf,
    pub project_id: String,
    pub version: u64,
    pub status: MapStatus,
    pub files: usize,
    pub features: usize,
    pub framework: Option<String>,
    pub entry_points: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct IncludedFile {
    pub id: String,
    pub path: String,
    pub tokens: usize,
}

#[derive(Debug, Serialize)]
pub struct ContextSummary {
    pub query: String,
    pub included: Vec<IncludedFile>,
    pub excluded: Vec<String>,
    pub missing: Vec<String>,
    pub used_tokens: usize,
    pub budget: usize,
}

#[derive(Debug, Serialize)]
pub struct PolicySummary {
    pub tier: StrategyTier,
    pub thresholds: PolicyThresholds,
}

fn project_id(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| DEFAULT_PROJECT.to_string())
}

fn scan(root: &Path) -> Result<Vec<FileRecord>> {
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }
    let files = ThemeScanner::new(root).scan();
    log::info!("Scanned {} theme files under {}", files.len(), root.display());
    Ok(files)
}

fn service(root: &Path) -> Result<ThemeMapService> {
    let indexer = ThemeMapIndexer::new(IndexerConfig::default(), Arc::new(Chunker::default()))
        .context("Failed to create theme map indexer")?;
    Ok(ThemeMapService::new(
        indexer,
        Arc::new(FsThemeMapStore::new(root.join(MAP_DIR))),
        Arc::new(ThemeMapCache::default()),
        SchedulerConfig::default(),
    ))
}

pub async fn index(root: &Path) -> Result<IndexSummary> {
    let files = scan(root)?;
    let project = project_id(root);
    let service = service(root)?;
    let map = service
        .rebuild(&project, &files)
        .await
        .with_context(|| format!("Failed to index {}", root.display()))?;
    service.shutdown().await;

    Ok(IndexSummary {
        root: root.to_path_buf(),
        project_id: project,
        version: map.version,
        status: map.status,
        files: map.file_count(),
        features: map.feature_count(),
        framework: map.framework.clone(),
        entry_points: map.entry_points.clone(),
    })
}

/// Look up against the persisted map, building it first on a cold theme.
pub async fn lookup(
    root: &Path,
    query: &str,
    top_n: usize,
    active_path: Option<String>,
) -> Result<LookupResult> {
    let project = project_id(root);
    let service = service(root)?;
    if service.load(&project).await?.is_none() {
        log::info!("No theme map for {project}; indexing first");
        let files = scan(root)?;
        service.rebuild(&project, &files).await?;
    }
    let options = LookupOptions {
        top_n,
        active_path,
        ..LookupOptions::default()
    };
    let result = service.lookup(&project, query, &options).await?;
    service.shutdown().await;
    Ok(result)
}

pub fn chunk(file: &Path) -> Result<Vec<Chunk>> {
    let content =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let path = file.to_string_lossy().replace('\\', "/");
    let chunks = Chunker::default().chunk(&path, &content);
    Ok(chunks.as_ref().clone())
}

async fn hybrid_hits(
    files: &[FileRecord],
    query: &str,
    limit: usize,
    keyword_only: bool,
) -> Result<Vec<SearchHit>> {
    let search = if keyword_only {
        HybridSearch::keyword_only()
    } else {
        let index = InMemoryVectorIndex::new(StubEmbedder::default());
        index
            .index_files(files)
            .await
            .context("Failed to build vector index")?;
        HybridSearch::new(HybridConfig::default(), Some(Arc::new(index)))
    };
    Ok(search.search(query, files, limit).await?)
}

pub async fn search(
    root: &Path,
    query: &str,
    limit: usize,
    keyword_only: bool,
) -> Result<Vec<SearchHit>> {
    let files = scan(root)?;
    hybrid_hits(&files, query, limit, keyword_only).await
}

pub async fn context(
    root: &Path,
    query: &str,
    budget: usize,
    active_path: Option<String>,
    top_n: usize,
) -> Result<ContextSummary> {
    let files = scan(root)?;
    let hits = hybrid_hits(&files, query, top_n, false).await?;
    let engine = ContextEngine::from_files(&files);

    let mut request = SelectionRequest::new(query, budget)
        .with_top_n(top_n)
        .with_hybrid_hits(hits);
    if let Some(path) = active_path {
        request = request.with_active_path(path);
    }
    let bundle = engine.select_relevant_files(&request);

    let path_of = |id: &String| {
        engine
            .file(id)
            .map_or_else(|| id.clone(), |file| file.path.clone())
    };
    Ok(ContextSummary {
        query: query.to_string(),
        included: bundle
            .files
            .iter()
            .map(|file| IncludedFile {
                id: file.id.clone(),
                path: file.path.clone(),
                tokens: estimate_tokens(&file.content),
            })
            .collect(),
        excluded: bundle.excluded.iter().map(path_of).collect(),
        missing: bundle.missing.clone(),
        used_tokens: bundle.used_tokens,
        budget: bundle.budget,
    })
}

pub fn policy(config: &PolicyConfig) -> PolicySummary {
    PolicySummary {
        tier: config.tier,
        thresholds: config.thresholds().clone(),
    }
}
