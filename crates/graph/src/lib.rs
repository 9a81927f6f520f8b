//! # Theme Graph
//!
//! File-level reference graph of a theme.
//!
//! ```text
//! FileRecord[]
//!     │
//!     ├──> extract_references (per file type)
//!     │      ├─ render / include / section tags
//!     │      ├─ asset_url filters
//!     │      ├─ section types in JSON templates
//!     │      └─ style / script imports
//!     │
//!     ├──> resolve_reference → project-relative path
//!     │
//!     └──> ReferenceGraph (petgraph StableDiGraph)
//!            ├─ dependencies / dependents
//!            ├─ closure (BFS)
//!            └─ dangling targets, connected when the file appears
//! ```

mod error;
mod graph;
mod references;

pub use error::{GraphError, Result};
pub use graph::ReferenceGraph;
pub use references::{extract_references, resolve_reference, Reference, ReferenceKind};
