//! Debounced, per-project incremental reindexing.
//!
//! Each project gets one actor task. Edits mark files dirty; the actor flushes
//! all dirty files together once the project has been quiet for `debounce`
//! (or `max_batch_wait` after the first pending edit). A flush in progress is
//! never interrupted: edits arriving meanwhile queue up for the next window.

use crate::error::{Result, ThemeMapError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use theme_protocol::{content_hash, FileRecord};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub debounce: Duration,
    pub max_batch_wait: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1_500),
            max_batch_wait: Duration::from_secs(10),
        }
    }
}

/// Receives the coalesced batch of dirty files.
#[async_trait]
pub trait FlushSink: Send + Sync {
    async fn flush(&self, project_id: &str, files: Vec<FileRecord>) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub flushed: Vec<String>,
    pub skipped_unchanged: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.flushed.is_empty() && self.skipped_unchanged.is_empty()
    }
}

enum SchedulerCommand {
    MarkDirty(FileRecord),
    /// Dirty regardless of the last flushed hash
    Invalidate(FileRecord),
    Flush(oneshot::Sender<FlushReport>),
    Shutdown,
}

struct DebounceState {
    debounce: Duration,
    max_batch: Duration,
    first_event: Option<Instant>,
    last_event: Option<Instant>,
}

impl DebounceState {
    const fn new(debounce: Duration, max_batch: Duration) -> Self {
        Self {
            debounce,
            max_batch,
            first_event: None,
            last_event: None,
        }
    }

    fn record_event(&mut self) {
        let now = Instant::now();
        self.last_event = Some(now);
        self.first_event.get_or_insert(now);
    }

    fn next_deadline(&self) -> Option<Instant> {
        let last = self.last_event?;
        let quiet = last + self.debounce;
        Some(match self.first_event {
            Some(first) => quiet.min(first + self.max_batch),
            None => quiet,
        })
    }

    fn reset(&mut self) {
        self.first_event = None;
        self.last_event = None;
    }
}

struct PendingWrites {
    project_id: String,
    /// Latest content per dirty path
    dirty: BTreeMap<String, FileRecord>,
    /// Content hash at the last successful flush
    flushed_hashes: HashMap<String, String>,
}

impl PendingWrites {
    async fn flush(&mut self, sink: &dyn FlushSink) -> FlushReport {
        let mut report = FlushReport::default();
        let mut batch = Vec::new();
        let mut hashes = Vec::new();
        for (path, file) in std::mem::take(&mut self.dirty) {
            let hash = content_hash(&file.content);
            if self.flushed_hashes.get(&path) == Some(&hash) {
                report.skipped_unchanged.push(path);
            } else {
                hashes.push((path.clone(), hash));
                report.flushed.push(path);
                batch.push(file);
            }
        }
        if batch.is_empty() {
            return report;
        }

        match sink.flush(&self.project_id, batch.clone()).await {
            Ok(()) => {
                self.flushed_hashes.extend(hashes);
                log::info!(
                    "Flushed {} files for {} ({} unchanged)",
                    report.flushed.len(),
                    self.project_id,
                    report.skipped_unchanged.len()
                );
            }
            Err(err) => {
                log::warn!("Reindex flush failed for {}: {err}", self.project_id);
                report.error = Some(err.to_string());
                for file in batch {
                    self.dirty.entry(file.path.clone()).or_insert(file);
                }
            }
        }
        report
    }
}

/// Handle to one project's reindex actor.
pub struct ReindexScheduler {
    project_id: String,
    command_tx: mpsc::Sender<SchedulerCommand>,
    report_tx: broadcast::Sender<FlushReport>,
    task: JoinHandle<()>,
}

impl ReindexScheduler {
    /// Spawn the actor. `known_hashes` seeds the unchanged-content check.
    pub fn start(
        project_id: impl Into<String>,
        config: SchedulerConfig,
        sink: Arc<dyn FlushSink>,
        known_hashes: HashMap<String, String>,
    ) -> Self {
        let project_id = project_id.into();
        let (command_tx, command_rx) = mpsc::channel(256);
        let (report_tx, _) = broadcast::channel(16);
        let pending = PendingWrites {
            project_id: project_id.clone(),
            dirty: BTreeMap::new(),
            flushed_hashes: known_hashes,
        };
        let task = tokio::spawn(run_loop(
            config,
            pending,
            sink,
            command_rx,
            report_tx.clone(),
        ));
        Self {
            project_id,
            command_tx,
            report_tx,
            task,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub async fn mark_dirty(&self, file: FileRecord) -> Result<()> {
        self.command_tx
            .send(SchedulerCommand::MarkDirty(file))
            .await
            .map_err(|_| ThemeMapError::SchedulerClosed(self.project_id.clone()))
    }

    /// Mark dirty even when the content matches the last flush, for files
    /// whose map entry was changed outside a reindex.
    pub async fn invalidate(&self, file: FileRecord) -> Result<()> {
        self.command_tx
            .send(SchedulerCommand::Invalidate(file))
            .await
            .map_err(|_| ThemeMapError::SchedulerClosed(self.project_id.clone()))
    }

    /// Flush now instead of waiting for the timer.
    pub async fn flush(&self) -> Result<FlushReport> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(SchedulerCommand::Flush(tx))
            .await
            .map_err(|_| ThemeMapError::SchedulerClosed(self.project_id.clone()))?;
        rx.await
            .map_err(|_| ThemeMapError::SchedulerClosed(self.project_id.clone()))
    }

    /// Reports of timer-driven flushes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FlushReport> {
        self.report_tx.subscribe()
    }

    /// Stop the actor after flushing whatever is pending.
    pub async fn shutdown(self) {
        let _ = self.command_tx.send(SchedulerCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

async fn run_loop(
    config: SchedulerConfig,
    mut pending: PendingWrites,
    sink: Arc<dyn FlushSink>,
    mut command_rx: mpsc::Receiver<SchedulerCommand>,
    report_tx: broadcast::Sender<FlushReport>,
) {
    let mut state = DebounceState::new(config.debounce, config.max_batch_wait);
    loop {
        let deadline = state.next_deadline();
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(SchedulerCommand::MarkDirty(file)) => {
                        pending.dirty.insert(file.path.clone(), file);
                        state.record_event();
                    }
                    Some(SchedulerCommand::Invalidate(file)) => {
                        pending.flushed_hashes.remove(&file.path);
                        pending.dirty.insert(file.path.clone(), file);
                        state.record_event();
                    }
                    Some(SchedulerCommand::Flush(reply)) => {
                        state.reset();
                        let report = pending.flush(sink.as_ref()).await;
                        if report.error.is_some() {
                            state.record_event();
                        }
                        let _ = reply.send(report);
                    }
                    Some(SchedulerCommand::Shutdown) | None => {
                        if !pending.dirty.is_empty() {
                            let report = pending.flush(sink.as_ref()).await;
                            let _ = report_tx.send(report);
                        }
                        break;
                    }
                }
            }
            () = async {
                if let Some(deadline) = deadline {
                    time::sleep_until(deadline).await;
                }
            }, if deadline.is_some() => {
                state.reset();
                let report = pending.flush(sink.as_ref()).await;
                if report.error.is_some() {
                    // retried on the next window
                    state.record_event();
                }
                if !report.is_empty() {
                    let _ = report_tx.send(report);
                }
            }
        }
    }
    log::debug!("Reindex scheduler for {} stopped", pending.project_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    struct RecordingSink {
        batches: TokioMutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl FlushSink for RecordingSink {
        async fn flush(&self, _project_id: &str, files: Vec<FileRecord>) -> Result<()> {
            self.batches
                .lock()
                .await
                .push(files.into_iter().map(|f| f.path).collect());
            Ok(())
        }
    }

    /// Fails the first flush, then records like `RecordingSink`.
    #[derive(Default)]
    struct FailOnceSink {
        calls: TokioMutex<usize>,
        batches: TokioMutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl FlushSink for FailOnceSink {
        async fn flush(&self, _project_id: &str, files: Vec<FileRecord>) -> Result<()> {
            let mut calls = self.calls.lock().await;
            *calls += 1;
            if *calls == 1 {
                return Err(ThemeMapError::Other("disk full".to_string()));
            }
            self.batches
                .lock()
                .await
                .push(files.into_iter().map(|f| f.path).collect());
            Ok(())
        }
    }

    fn quick() -> SchedulerConfig {
        SchedulerConfig {
            debounce: Duration::from_millis(30),
            max_batch_wait: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_deadline_is_capped_by_max_batch() {
        let mut state = DebounceState::new(Duration::from_secs(5), Duration::from_secs(1));
        assert!(state.next_deadline().is_none());
        state.record_event();
        let deadline = state.next_deadline().unwrap();
        assert!(deadline <= Instant::now() + Duration::from_secs(1));
        state.reset();
        assert!(state.next_deadline().is_none());
    }

    #[tokio::test]
    async fn test_edits_within_window_coalesce() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = ReindexScheduler::start("p", quick(), sink.clone(), HashMap::new());
        let mut reports = scheduler.subscribe();

        scheduler.mark_dirty(FileRecord::new("1", "assets/a.css", ".a{}")).await.unwrap();
        scheduler.mark_dirty(FileRecord::new("1", "assets/a.css", ".a{x:y}")).await.unwrap();
        scheduler.mark_dirty(FileRecord::new("2", "assets/b.css", ".b{}")).await.unwrap();

        let report = time::timeout(Duration::from_secs(5), reports.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.flushed, vec!["assets/a.css", "assets/b.css"]);
        assert_eq!(*sink.batches.lock().await, vec![vec!["assets/a.css", "assets/b.css"]]);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_unchanged_content_is_skipped() {
        let sink = Arc::new(RecordingSink::default());
        let known = HashMap::from([("assets/a.css".to_string(), content_hash(".a{}"))]);
        let scheduler = ReindexScheduler::start("p", SchedulerConfig::default(), sink.clone(), known);

        scheduler.mark_dirty(FileRecord::new("1", "assets/a.css", ".a{}")).await.unwrap();
        let report = scheduler.flush().await.unwrap();
        assert_eq!(report.skipped_unchanged, vec!["assets/a.css"]);
        assert!(report.flushed.is_empty());
        assert!(sink.batches.lock().await.is_empty());

        scheduler.mark_dirty(FileRecord::new("1", "assets/a.css", ".a{b:c}")).await.unwrap();
        assert_eq!(scheduler.flush().await.unwrap().flushed, vec!["assets/a.css"]);
        // Same content again: nothing to do
        scheduler.mark_dirty(FileRecord::new("1", "assets/a.css", ".a{b:c}")).await.unwrap();
        assert_eq!(
            scheduler.flush().await.unwrap().skipped_unchanged,
            vec!["assets/a.css"]
        );
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_files_dirty() {
        let sink = Arc::new(FailOnceSink::default());
        let scheduler = ReindexScheduler::start("p", SchedulerConfig::default(), sink.clone(), HashMap::new());

        scheduler.mark_dirty(FileRecord::new("1", "assets/a.css", ".a{}")).await.unwrap();
        let failed = scheduler.flush().await.unwrap();
        assert!(failed.error.is_some());

        let retried = scheduler.flush().await.unwrap();
        assert_eq!(retried.error, None);
        assert_eq!(retried.flushed, vec!["assets/a.css"]);
        assert_eq!(*sink.batches.lock().await, vec![vec!["assets/a.css"]]);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_timer_flush_is_retried() {
        let sink = Arc::new(FailOnceSink::default());
        let scheduler = ReindexScheduler::start("p", quick(), sink.clone(), HashMap::new());
        let mut reports = scheduler.subscribe();

        scheduler.mark_dirty(FileRecord::new("1", "assets/a.css", ".a{}")).await.unwrap();
        let first = time::timeout(Duration::from_secs(5), reports.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(first.error.is_some());
        let second = time::timeout(Duration::from_secs(5), reports.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.error, None);
        assert_eq!(second.flushed, vec!["assets/a.css"]);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalidate_bypasses_unchanged_check() {
        let sink = Arc::new(RecordingSink::default());
        let known = HashMap::from([("assets/a.css".to_string(), content_hash(".a{}"))]);
        let scheduler = ReindexScheduler::start("p", SchedulerConfig::default(), sink.clone(), known);

        scheduler.invalidate(FileRecord::new("1", "assets/a.css", ".a{}")).await.unwrap();
        assert_eq!(scheduler.flush().await.unwrap().flushed, vec!["assets/a.css"]);
        assert_eq!(sink.batches.lock().await.len(), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = ReindexScheduler::start("p", SchedulerConfig::default(), sink.clone(), HashMap::new());
        scheduler.mark_dirty(FileRecord::new("1", "assets/a.css", ".a{}")).await.unwrap();
        scheduler.shutdown().await;
        assert_eq!(sink.batches.lock().await.len(), 1);
    }
}
