//! # Theme Map
//!
//! Persisted whole-project structural index of a theme.
//!
//! ```text
//! FileRecord[] ──> ThemeMapIndexer::build
//!                     ├─ chunker → features (slug → lines, description, keywords)
//!                     ├─ purpose (schema name or path)
//!                     ├─ reference graph → depends_on / rendered_by
//!                     └─ conventions → patterns, global patterns, framework
//!
//! edit ──> repair line ranges ──> ReindexScheduler (debounced, per project)
//!                                      └─ flush → reindex_file (hash gated)
//!
//! query ──> lookup → targets + matched features + related files
//! ```
//!
//! Maps live in a [`ThemeMapCache`] and are persisted through a
//! [`ThemeMapStore`] after every full or incremental update. Enrichment with
//! model-written summaries is optional and never blocks indexing.

mod cache;
mod config;
mod conventions;
mod enrich;
mod error;
mod features;
mod indexer;
mod lookup;
mod repair;
mod scanner;
mod scheduler;
mod service;
mod store;
mod text;
mod types;

pub use cache::ThemeMapCache;
pub use config::IndexerConfig;
pub use conventions::{detect_framework, file_patterns, global_patterns};
pub use enrich::{
    apply_summaries, pending_requests, summarize_in_batches, EnrichReport, FileSummary,
    Summarizer, SummaryRequest, DEFAULT_BATCH_SIZE,
};
pub use error::{Result, ThemeMapError};
pub use features::{extract_features, feature_slug};
pub use indexer::{derive_purpose, BuildOutput, ReindexOutcome, ThemeMapIndexer};
pub use lookup::{
    detect_intent, lookup, ConceptExpander, EditIntent, LookupOptions, LookupResult,
    LookupTarget, MatchedFeature,
};
pub use repair::{apply_line_edit, repair_feature, EditKind, LineEdit};
pub use scanner::ThemeScanner;
pub use scheduler::{FlushReport, FlushSink, ReindexScheduler, SchedulerConfig};
pub use service::ThemeMapService;
pub use store::{FsThemeMapStore, MemoryThemeMapStore, ThemeMapStore};
pub use text::{slugify, tokenize};
pub use types::{Feature, MapStatus, ThemeMap, ThemeMapFile};
