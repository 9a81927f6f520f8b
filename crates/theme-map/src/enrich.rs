//! Optional natural-language summaries for map entries.
//!
//! Enrichment never fails the map: a failed batch leaves existing summaries
//! untouched and is only counted.

use crate::error::Result;
use crate::types::ThemeMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use theme_protocol::{content_hash, FileRecord};

pub const DEFAULT_BATCH_SIZE: usize = 8;
const EXCERPT_CHARS: usize = 4_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub path: String,
    pub purpose: String,
    /// Feature descriptions in slug order
    pub features: Vec<String>,
    pub excerpt: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub summary: String,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, batch: &[SummaryRequest]) -> Result<Vec<FileSummary>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub requested: usize,
    pub applied: usize,
    pub failed_batches: usize,
}

/// Files whose summary is missing or was written for older content.
pub fn pending_requests(map: &ThemeMap, files: &[FileRecord]) -> Vec<SummaryRequest> {
    let mut requests = Vec::new();
    for file in files {
        let Some(entry) = map.file(&file.path) else {
            continue;
        };
        if file.is_stub() || entry.has_fresh_summary() {
            continue;
        }
        let hash = content_hash(&file.content);
        if entry.content_hash.as_deref() != Some(hash.as_str()) {
            // Map has not caught up with this content yet
            continue;
        }
        requests.push(SummaryRequest {
            path: file.path.clone(),
            purpose: entry.purpose.clone(),
            features: entry.features.values().map(|f| f.description.clone()).collect(),
            excerpt: file.content.chars().take(EXCERPT_CHARS).collect(),
            content_hash: hash,
        });
    }
    requests
}

/// Summaries paired with the hash they were produced for.
pub struct SummaryBatchOutput {
    pub summaries: Vec<(FileSummary, String)>,
    pub failed_batches: usize,
}

pub async fn summarize_in_batches(
    summarizer: &dyn Summarizer,
    requests: &[SummaryRequest],
    batch_size: usize,
) -> SummaryBatchOutput {
    let mut out = SummaryBatchOutput {
        summaries: Vec::new(),
        failed_batches: 0,
    };
    for batch in requests.chunks(batch_size.max(1)) {
        match summarizer.summarize(batch).await {
            Ok(summaries) => {
                let hashes: HashMap<&str, &str> = batch
                    .iter()
                    .map(|r| (r.path.as_str(), r.content_hash.as_str()))
                    .collect();
                for summary in summaries {
                    let trimmed = summary.summary.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if let Some(hash) = hashes.get(summary.path.as_str()) {
                        let hash = (*hash).to_string();
                        out.summaries.push((
                            FileSummary {
                                path: summary.path,
                                summary: trimmed.to_string(),
                            },
                            hash,
                        ));
                    }
                }
            }
            Err(err) => {
                log::warn!("Enrichment batch of {} files failed: {err}", batch.len());
                out.failed_batches += 1;
            }
        }
    }
    out
}

/// Apply summaries whose hash still matches the entry. Bumps the version once
/// if anything was applied.
pub fn apply_summaries(map: &mut ThemeMap, summaries: &[(FileSummary, String)]) -> usize {
    let mut applied = 0;
    for (summary, hash) in summaries {
        let Some(entry) = map.files.get_mut(&summary.path) else {
            continue;
        };
        if entry.content_hash.as_deref() != Some(hash.as_str()) {
            continue;
        }
        entry.summary = Some(summary.summary.clone());
        entry.summary_hash = Some(hash.clone());
        applied += 1;
    }
    if applied > 0 {
        map.bump();
    }
    applied
}
