//! # Theme Search
//!
//! Keyword ranking fused with vector similarity.
//!
//! ```text
//! query ──> keyword_search (always) ─────────┐
//!      └──> VectorSearch (optional) ─ ≥ threshold ─┴─> RRF ─> SearchHit[]
//! ```
//!
//! When the vector side is disabled, unavailable, failing or empty the result
//! is exactly the keyword ranking, every hit tagged [`HitSource::Keyword`].

mod config;
mod error;
mod fusion;
mod hybrid;
mod keyword;
mod types;
mod vector;

pub use config::HybridConfig;
pub use error::{Result, SearchError};
pub use fusion::{FusedEntry, RankedList, RrfFusion};
pub use hybrid::HybridSearch;
pub use keyword::{keyword_score, keyword_search, query_terms};
pub use types::{HitSource, SearchHit, VectorHit};
pub use vector::{cosine_similarity, Embedder, InMemoryVectorIndex, StubEmbedder, VectorSearch};
