use crate::error::{GraphError, Result};
use crate::references::{extract_references, resolve_reference, ReferenceKind};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use theme_protocol::{FileRecord, FileType};

/// Whole-project file reference graph.
///
/// Nodes are project-relative paths, edges point from the referencing file to
/// the referenced one. References to files that are not (yet) part of the
/// project are kept as dangling and connected once the target appears.
#[derive(Default)]
pub struct ReferenceGraph {
    graph: StableDiGraph<String, ReferenceKind>,
    nodes: HashMap<String, NodeIndex>,
    /// target path -> sources waiting for it
    dangling: HashMap<String, HashSet<(String, ReferenceKind)>>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a complete file set.
    pub fn from_files<'a>(files: impl IntoIterator<Item = &'a FileRecord>) -> Self {
        let files: Vec<&FileRecord> = files.into_iter().collect();
        let mut graph = Self::new();
        for file in &files {
            graph.ensure_node(&file.path);
        }
        for file in &files {
            graph.update_file(&file.path, file.file_type, &file.content);
        }
        log::debug!(
            "Built reference graph: {} files, {} edges, {} dangling targets",
            graph.file_count(),
            graph.edge_count(),
            graph.dangling.len()
        );
        graph
    }

    fn ensure_node(&mut self, path: &str) -> NodeIndex {
        if let Some(idx) = self.nodes.get(path) {
            return *idx;
        }
        let idx = self.graph.add_node(path.to_string());
        self.nodes.insert(path.to_string(), idx);

        // Connect sources that were waiting for this file.
        if let Some(waiting) = self.dangling.remove(path) {
            for (source, kind) in waiting {
                if let Some(from) = self.nodes.get(&source).copied() {
                    self.graph.add_edge(from, idx, kind);
                }
            }
        }
        idx
    }

    /// Re-derive the outgoing edges of one file from its content.
    ///
    /// Returns the resolved targets in source order, deduplicated.
    pub fn update_file(&mut self, path: &str, file_type: FileType, content: &str) -> Vec<String> {
        let from = self.ensure_node(path);

        let outgoing: Vec<_> = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in outgoing {
            self.graph.remove_edge(edge);
        }
        for waiting in self.dangling.values_mut() {
            waiting.retain(|(source, _)| source != path);
        }
        self.dangling.retain(|_, waiting| !waiting.is_empty());

        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for reference in extract_references(file_type, path, content) {
            let Some(target) = resolve_reference(&reference, path) else {
                continue;
            };
            if target == path || !seen.insert(target.clone()) {
                continue;
            }
            match self.nodes.get(&target).copied() {
                Some(to) => {
                    self.graph.add_edge(from, to, reference.kind);
                }
                None => {
                    self.dangling
                        .entry(target.clone())
                        .or_default()
                        .insert((path.to_string(), reference.kind));
                }
            }
            targets.push(target);
        }
        targets
    }

    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        let idx = self
            .nodes
            .remove(path)
            .ok_or_else(|| GraphError::FileNotFound(path.to_string()))?;

        // Incoming references become dangling again.
        let incoming: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|e| {
                self.graph
                    .node_weight(e.source())
                    .map(|source| (source.clone(), *e.weight()))
            })
            .collect();
        if !incoming.is_empty() {
            self.dangling
                .entry(path.to_string())
                .or_default()
                .extend(incoming);
        }
        for waiting in self.dangling.values_mut() {
            waiting.retain(|(source, _)| source != path);
        }
        self.dangling.retain(|_, waiting| !waiting.is_empty());

        self.graph.remove_node(idx);
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    fn neighbors(&self, path: &str, direction: Direction) -> Vec<String> {
        let Some(idx) = self.nodes.get(path) else {
            return Vec::new();
        };
        let set: BTreeSet<String> = self
            .graph
            .neighbors_directed(*idx, direction)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        set.into_iter().collect()
    }

    /// Files `path` references, sorted.
    pub fn dependencies(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Files referencing `path`, sorted.
    pub fn dependents(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Incoming)
    }

    /// Unresolved targets referenced by `path`, sorted.
    pub fn dangling_from(&self, path: &str) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .dangling
            .iter()
            .filter(|(_, waiting)| waiting.iter().any(|(source, _)| source == path))
            .map(|(target, _)| target)
            .collect();
        set.into_iter().cloned().collect()
    }

    /// Seeds plus every file transitively reachable from them, in BFS order.
    /// Unknown seeds are kept but not expanded.
    pub fn closure<S: AsRef<str>>(&self, seeds: &[S]) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        for seed in seeds {
            let seed = seed.as_ref().to_string();
            if seen.insert(seed.clone()) {
                queue.push_back(seed);
            }
        }
        while let Some(path) = queue.pop_front() {
            for dep in self.dependencies(&path) {
                if seen.insert(dep.clone()) {
                    queue.push_back(dep);
                }
            }
            order.push(path);
        }
        order
    }

    pub fn file_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
