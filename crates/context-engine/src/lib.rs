//! # Theme Context Engine
//!
//! Picks which files a model sees for one turn.
//!
//! ```text
//! FileRecord[] ──> FileMetadata (tokens, references)
//!
//! query ──> mentions + active file + topics ──┐ priority
//!       └─> fuzzy matches + hybrid hits ──────┤ requested
//!                                             ▼
//!                   build_context: priority → requested → dependencies
//!                   (greedy, stops for good at the first overflow)
//! ```

mod bundle;
mod engine;
mod error;
mod metadata;
mod registry;
mod topics;

pub use bundle::ContextBundle;
pub use engine::{ContextEngine, FuzzyMatch, SelectionRequest, DEFAULT_TOP_N};
pub use error::{ContextError, Result};
pub use metadata::{estimate_tokens, FileMetadata};
pub use registry::{EngineRegistry, SharedEngine, DEFAULT_ENGINE_CAPACITY};
pub use topics::{builtin_topics, ThemeTopic, TopicTable};
