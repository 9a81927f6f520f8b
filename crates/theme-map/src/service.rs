use crate::cache::ThemeMapCache;
use crate::enrich::{apply_summaries, pending_requests, summarize_in_batches, EnrichReport, Summarizer};
use crate::error::{Result, ThemeMapError};
use crate::indexer::{ReindexOutcome, ThemeMapIndexer};
use crate::lookup::{lookup, LookupOptions, LookupResult};
use crate::repair::{apply_line_edit, LineEdit};
use crate::scheduler::{FlushReport, FlushSink, ReindexScheduler, SchedulerConfig};
use crate::store::ThemeMapStore;
use crate::types::{MapStatus, ThemeMap};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use theme_graph::ReferenceGraph;
use theme_protocol::FileRecord;
use tokio::sync::Mutex as TokioMutex;

/// Project-scoped theme map operations: build, incremental reindex, line
/// repair, enrichment, lookup and persistence.
#[derive(Clone)]
pub struct ThemeMapService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    indexer: ThemeMapIndexer,
    store: Arc<dyn ThemeMapStore>,
    cache: Arc<ThemeMapCache>,
    graphs: Mutex<HashMap<String, ReferenceGraph>>,
    schedulers: TokioMutex<HashMap<String, ReindexScheduler>>,
    /// Serializes map mutations
    writes: TokioMutex<()>,
    scheduler_config: SchedulerConfig,
    enrich_batch_size: usize,
}

impl ThemeMapService {
    pub fn new(
        indexer: ThemeMapIndexer,
        store: Arc<dyn ThemeMapStore>,
        cache: Arc<ThemeMapCache>,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                indexer,
                store,
                cache,
                graphs: Mutex::new(HashMap::new()),
                schedulers: TokioMutex::new(HashMap::new()),
                writes: TokioMutex::new(()),
                scheduler_config,
                enrich_batch_size: crate::enrich::DEFAULT_BATCH_SIZE,
            }),
        }
    }

    #[must_use]
    pub fn with_enrich_batch_size(self, batch_size: usize) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.enrich_batch_size = batch_size.max(1);
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => Self { inner },
        }
    }

    pub fn cache(&self) -> &Arc<ThemeMapCache> {
        &self.inner.cache
    }

    fn graphs(&self) -> std::sync::MutexGuard<'_, HashMap<String, ReferenceGraph>> {
        self.inner
            .graphs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Cached snapshot, falling back to the store on a cold start.
    pub async fn load(&self, project_id: &str) -> Result<Option<Arc<ThemeMap>>> {
        if let Some(map) = self.inner.cache.get(project_id) {
            return Ok(Some(map));
        }
        match self.inner.store.load(project_id).await? {
            Some(map) => {
                log::debug!("Loaded theme map {project_id} v{} from store", map.version);
                Ok(Some(self.inner.cache.put(map)))
            }
            None => Ok(None),
        }
    }

    async fn current(&self, project_id: &str) -> Result<Arc<ThemeMap>> {
        self.load(project_id)
            .await?
            .ok_or_else(|| ThemeMapError::ProjectNotFound(project_id.to_string()))
    }

    async fn commit(&self, map: ThemeMap) -> Result<Arc<ThemeMap>> {
        self.inner.store.save(&map).await?;
        Ok(self.inner.cache.put(map))
    }

    /// Full synchronous build over the complete file set.
    pub async fn rebuild(&self, project_id: &str, files: &[FileRecord]) -> Result<Arc<ThemeMap>> {
        let _guard = self.inner.writes.lock().await;
        let previous = self.load(project_id).await?;
        let out = self
            .inner
            .indexer
            .build(project_id, files, previous.as_deref());
        self.graphs().insert(project_id.to_string(), out.graph);
        self.commit(out.map).await
    }

    /// Reindex the given files right away.
    pub async fn reindex_now(
        &self,
        project_id: &str,
        files: &[FileRecord],
    ) -> Result<Arc<ThemeMap>> {
        let _guard = self.inner.writes.lock().await;
        let current = self.current(project_id).await?;
        let mut map = (*current).clone();

        let mut updated = 0usize;
        {
            let mut graphs = self.graphs();
            let mut graph = graphs.get_mut(project_id);
            for file in files {
                let outcome = self
                    .inner
                    .indexer
                    .reindex_file(&mut map, file, graph.as_deref_mut());
                if outcome != ReindexOutcome::Unchanged {
                    updated += 1;
                }
            }
        }
        if map.status == MapStatus::Stale && map.files.values().all(|f| f.stale_feature_count() == 0)
        {
            map.status = MapStatus::Ready;
        }
        if map == *current {
            return Ok(current);
        }
        log::debug!(
            "Reindexed {updated}/{} files for {project_id}, now v{}",
            files.len(),
            map.version
        );
        self.commit(map).await
    }

    /// Drop a deleted file from the map.
    pub async fn delete_file(&self, project_id: &str, path: &str) -> Result<bool> {
        let _guard = self.inner.writes.lock().await;
        let current = self.current(project_id).await?;
        let mut map = (*current).clone();
        let removed = {
            let mut graphs = self.graphs();
            self.inner
                .indexer
                .remove_file(&mut map, path, graphs.get_mut(project_id))
        };
        if removed {
            self.commit(map).await?;
        }
        Ok(removed)
    }

    /// Repair line ranges for an in-place edit and schedule a debounced reindex.
    pub async fn record_edit(
        &self,
        project_id: &str,
        file: FileRecord,
        edit: Option<LineEdit>,
    ) -> Result<()> {
        let mut repaired = false;
        if let Some(edit) = edit {
            let _guard = self.inner.writes.lock().await;
            let current = self.current(project_id).await?;
            let mut map = (*current).clone();
            if apply_line_edit(&mut map, &file.path, &edit) > 0 {
                repaired = true;
                // Repaired ranges no longer describe the indexed content
                if let Some(entry) = map.files.get_mut(&file.path) {
                    entry.content_hash = None;
                }
                if map.files.values().any(|f| f.stale_feature_count() > 0) {
                    map.status = MapStatus::Stale;
                }
                self.commit(map).await?;
            }
        }

        let mut schedulers = self.inner.schedulers.lock().await;
        if !schedulers.contains_key(project_id) {
            let known = match self.load(project_id).await? {
                Some(map) => map
                    .files
                    .values()
                    .filter_map(|f| f.content_hash.clone().map(|h| (f.path.clone(), h)))
                    .collect(),
                None => HashMap::new(),
            };
            let sink = Arc::new(ServiceSink {
                inner: Arc::downgrade(&self.inner),
            });
            let scheduler = ReindexScheduler::start(
                project_id,
                self.inner.scheduler_config,
                sink,
                known,
            );
            schedulers.insert(project_id.to_string(), scheduler);
        }
        match schedulers.get(project_id) {
            Some(scheduler) if repaired => scheduler.invalidate(file).await,
            Some(scheduler) => scheduler.mark_dirty(file).await,
            None => Err(ThemeMapError::SchedulerClosed(project_id.to_string())),
        }
    }

    /// Flush pending edits of a project now.
    pub async fn flush(&self, project_id: &str) -> Result<FlushReport> {
        let schedulers = self.inner.schedulers.lock().await;
        match schedulers.get(project_id) {
            Some(scheduler) => scheduler.flush().await,
            None => Ok(FlushReport::default()),
        }
    }

    /// Summarize files lacking a fresh summary. Never fails the map.
    pub async fn enrich(
        &self,
        project_id: &str,
        files: &[FileRecord],
        summarizer: &dyn Summarizer,
    ) -> Result<EnrichReport> {
        let snapshot = self.current(project_id).await?;
        let requests = pending_requests(&snapshot, files);
        if requests.is_empty() {
            return Ok(EnrichReport::default());
        }

        {
            let _guard = self.inner.writes.lock().await;
            let mut map = (*self.current(project_id).await?).clone();
            map.status = MapStatus::Enriching;
            self.inner.cache.put(map);
        }

        let out = summarize_in_batches(summarizer, &requests, self.inner.enrich_batch_size).await;

        let _guard = self.inner.writes.lock().await;
        let mut map = (*self.current(project_id).await?).clone();
        let applied = apply_summaries(&mut map, &out.summaries);
        if map.status == MapStatus::Enriching {
            map.status = MapStatus::Ready;
        }
        self.commit(map).await?;

        let report = EnrichReport {
            requested: requests.len(),
            applied,
            failed_batches: out.failed_batches,
        };
        log::info!(
            "Enriched {project_id}: {} of {} summaries applied, {} failed batches",
            report.applied,
            report.requested,
            report.failed_batches
        );
        Ok(report)
    }

    pub async fn lookup(
        &self,
        project_id: &str,
        query: &str,
        options: &LookupOptions,
    ) -> Result<LookupResult> {
        let map = self.current(project_id).await?;
        Ok(lookup(&map, query, options))
    }

    /// Stop all schedulers, flushing what they hold.
    pub async fn shutdown(&self) {
        let schedulers: Vec<ReindexScheduler> = {
            let mut guard = self.inner.schedulers.lock().await;
            guard.drain().map(|(_, s)| s).collect()
        };
        for scheduler in schedulers {
            scheduler.shutdown().await;
        }
    }
}

struct ServiceSink {
    inner: Weak<ServiceInner>,
}

#[async_trait]
impl FlushSink for ServiceSink {
    async fn flush(&self, project_id: &str, files: Vec<FileRecord>) -> Result<()> {
        let inner = self
            .inner
            .upgrade()
            .ok_or_else(|| ThemeMapError::SchedulerClosed(project_id.to_string()))?;
        ThemeMapService { inner }
            .reindex_now(project_id, &files)
            .await
            .map(|_| ())
    }
}
