//! # Theme Code Chunker
//!
//! Structural chunking of theme files for feature targeting and context
//! assembly.
//!
//! ## Architecture
//!
//! ```text
//! path + content
//!     │
//!     ├──> chunk cache (path, content hash) ── hit ──> Arc<Vec<Chunk>>
//!     │
//!     ├──> FileType from extension
//!     │
//!     └──> Strategy chain (first non-empty Ok wins)
//!          ├─> template: Liquid tag tokenizer + schema JSON spans → Liquid regex → whole file
//!          ├─> style:    brace scanner                           → rule regex   → whole file
//!          ├─> script:   tree-sitter JS / TS                     → decl regex   → whole file
//!          ├─> config:   span-aware JSON scanner                 → key regex    → whole file
//!          └─> other:    whole file
//! ```
//!
//! A malformed schema block never aborts chunking: the regex pass recovers
//! what it can and otherwise emits a single raw schema chunk.
//!
//! ## Example
//!
//! ```rust
//! use theme_code_chunker::{ChunkKind, Chunker};
//!
//! let chunker = Chunker::default();
//! let chunks = chunker.chunk("assets/base.css", ".button { color: red; }\n");
//! assert_eq!(chunks[0].kind, ChunkKind::Rule);
//! assert_eq!(chunks[0].metadata.selector.as_deref(), Some(".button"));
//! ```

mod cache;
mod chunker;
mod config;
mod error;
mod json_spans;
mod lines;
mod script;
mod settings;
mod strategy;
mod style;
mod template;
mod types;

pub use cache::{CacheStats, ChunkCache};
pub use chunker::Chunker;
pub use config::ChunkerConfig;
pub use error::{ChunkerError, Result};
pub use script::{ScriptGrammarStrategy, ScriptRegexStrategy};
pub use settings::{JsonGrammarStrategy, JsonRegexStrategy};
pub use strategy::{ChunkStrategy, StrategyChain, WholeFileStrategy};
pub use style::{StyleGrammarStrategy, StyleRegexStrategy};
pub use template::{LiquidGrammarStrategy, LiquidRegexStrategy};
pub use types::{Chunk, ChunkKind, ChunkMetadata, ParseSource};
