use crate::config::IndexerConfig;
use crate::conventions::{detect_framework, file_patterns, global_patterns};
use crate::error::{Result, ThemeMapError};
use crate::features::extract_features;
use crate::types::{MapStatus, ThemeMap, ThemeMapFile};
use std::collections::BTreeSet;
use std::sync::Arc;
use theme_code_chunker::{Chunk, Chunker};
use theme_graph::ReferenceGraph;
use theme_protocol::{content_hash, FileRecord, FileType};

/// Result of a full build.
pub struct BuildOutput {
    pub map: ThemeMap,
    pub graph: ReferenceGraph,
    /// Paths skipped as generated or minified
    pub excluded: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexOutcome {
    /// Content hash matched; nothing changed
    Unchanged,
    Updated,
    /// File is now considered generated and was dropped from the map
    Excluded,
}

/// Builds theme maps from chunked files. Never calls out to a model.
pub struct ThemeMapIndexer {
    config: IndexerConfig,
    chunker: Arc<Chunker>,
}

impl ThemeMapIndexer {
    pub fn new(config: IndexerConfig, chunker: Arc<Chunker>) -> Result<Self> {
        config.validate().map_err(ThemeMapError::Other)?;
        Ok(Self { config, chunker })
    }

    pub fn chunker(&self) -> &Arc<Chunker> {
        &self.chunker
    }

    /// Minified or generated output is kept out of the map.
    pub fn is_generated(&self, file: &FileRecord) -> bool {
        file.name.contains(".min.")
            || file.content.len() > self.config.max_file_bytes
            || file
                .content
                .lines()
                .any(|line| line.chars().count() > self.config.max_line_length)
    }

    pub fn build(
        &self,
        project_id: &str,
        files: &[FileRecord],
        previous: Option<&ThemeMap>,
    ) -> BuildOutput {
        let (included, excluded): (Vec<&FileRecord>, Vec<&FileRecord>) =
            files.iter().partition(|f| !self.is_generated(f));
        let excluded: Vec<String> = excluded.into_iter().map(|f| f.path.clone()).collect();

        let graph = ReferenceGraph::from_files(included.iter().copied());
        let mut map = ThemeMap::new(project_id);
        map.status = MapStatus::Indexing;

        for file in &included {
            let chunks = self.chunker.chunk_record(file);
            let mut entry = self.describe(file, &chunks);
            entry.depends_on = graph.dependencies(&file.path);
            entry.rendered_by = graph.dependents(&file.path);
            if let Some(old) = previous.and_then(|p| p.file(&file.path)) {
                carry_summary(old, &mut entry);
            }
            map.files.insert(entry.path.clone(), entry);
        }

        map.global_patterns = global_patterns(
            map.files
                .values()
                .map(|f| (f.path.as_str(), f.patterns.as_slice())),
        );
        map.entry_points = map
            .files
            .keys()
            .filter(|p| is_entry_point(p))
            .cloned()
            .collect();
        map.framework = detect_framework(&included);
        map.version = previous.map_or(0, |p| p.version) + 1;
        map.status = MapStatus::Ready;

        log::info!(
            "Built theme map for {project_id}: {} files, {} features, {} edges, {} excluded",
            map.file_count(),
            map.feature_count(),
            graph.edge_count(),
            excluded.len()
        );
        BuildOutput {
            map,
            graph,
            excluded,
        }
    }

    /// Re-derive one file's entry.
    ///
    /// Dependency edges are recomputed only when a graph is supplied. Calling
    /// this again with identical content does not bump the version.
    pub fn reindex_file(
        &self,
        map: &mut ThemeMap,
        file: &FileRecord,
        graph: Option<&mut ReferenceGraph>,
    ) -> ReindexOutcome {
        if self.is_generated(file) {
            if map.files.remove(&file.path).is_some() {
                if let Some(graph) = graph {
                    // Present in the map means present in the graph
                    let _ = graph.remove_file(&file.path);
                }
                map.entry_points.retain(|p| p != &file.path);
                map.bump();
            }
            return ReindexOutcome::Excluded;
        }

        let hash = content_hash(&file.content);
        let previous = map.files.get(&file.path);
        if let Some(existing) = previous {
            if existing.content_hash.as_deref() == Some(hash.as_str())
                && existing.stale_feature_count() == 0
            {
                log::debug!("Reindex skipped, content unchanged: {}", file.path);
                return ReindexOutcome::Unchanged;
            }
        }

        let chunks = self
            .chunker
            .chunk_with_hash(&file.path, &file.content, &hash);
        let mut entry = self.describe(file, &chunks);
        let old_deps = previous.map(|p| p.depends_on.clone()).unwrap_or_default();
        if let Some(old) = previous {
            // Kept until enrichment replaces it; the hash mismatch marks it stale.
            entry.summary = old.summary.clone();
            entry.summary_hash = old.summary_hash.clone();
        }

        match graph {
            Some(graph) => {
                graph.update_file(&file.path, file.file_type, &file.content);
                entry.depends_on = graph.dependencies(&file.path);
                entry.rendered_by = graph.dependents(&file.path);

                let touched: BTreeSet<&String> =
                    old_deps.iter().chain(entry.depends_on.iter()).collect();
                for target in touched {
                    if let Some(target_entry) = map.files.get_mut(target) {
                        target_entry.rendered_by = graph.dependents(target);
                    }
                }
            }
            None => {
                if let Some(old) = map.files.get(&file.path) {
                    entry.depends_on = old.depends_on.clone();
                    entry.rendered_by = old.rendered_by.clone();
                }
            }
        }

        if is_entry_point(&file.path) && !map.entry_points.contains(&file.path) {
            map.entry_points.push(file.path.clone());
            map.entry_points.sort();
        }
        map.files.insert(file.path.clone(), entry);
        map.bump();
        ReindexOutcome::Updated
    }

    /// Remove a deleted file from the map.
    pub fn remove_file(
        &self,
        map: &mut ThemeMap,
        path: &str,
        graph: Option<&mut ReferenceGraph>,
    ) -> bool {
        let Some(removed) = map.files.remove(path) else {
            return false;
        };
        if let Some(graph) = graph {
            let _ = graph.remove_file(path);
            for target in &removed.depends_on {
                if let Some(entry) = map.files.get_mut(target) {
                    entry.rendered_by = graph.dependents(target);
                }
            }
        }
        map.entry_points.retain(|p| p != path);
        map.bump();
        true
    }

    fn describe(&self, file: &FileRecord, chunks: &[Chunk]) -> ThemeMapFile {
        let mut entry = ThemeMapFile::new(&file.path, file.file_type, derive_purpose(file, chunks));
        entry.features = extract_features(chunks);
        entry.patterns = file_patterns(file, chunks, self.config.pattern_min_rules);
        entry.content_hash = Some(content_hash(&file.content));
        entry
    }
}

fn carry_summary(old: &ThemeMapFile, entry: &mut ThemeMapFile) {
    if old.summary.is_some() && old.summary_hash == entry.content_hash {
        entry.summary = old.summary.clone();
        entry.summary_hash = old.summary_hash.clone();
    }
}

pub fn is_entry_point(path: &str) -> bool {
    path.starts_with("layout/") || path.starts_with("templates/")
}

/// Human purpose line: a declared schema name wins, then the path.
pub fn derive_purpose(file: &FileRecord, chunks: &[Chunk]) -> String {
    let mut segments: Vec<&str> = file.path.split('/').collect();
    let dir = if segments.len() > 1 { segments.remove(0) } else { "" };

    if let Some(name) = chunks.iter().find_map(|c| c.metadata.schema_name.as_deref()) {
        let kind = if dir == "snippets" { "snippet" } else { "section" };
        return format!("{name} {kind}");
    }

    let words: Vec<String> = segments
        .iter()
        .enumerate()
        .map(|(idx, seg)| {
            // Drop every extension from the last segment: base.css.liquid -> base
            let seg = if idx + 1 == segments.len() {
                seg.split('.').next().unwrap_or(seg)
            } else {
                seg
            };
            seg.replace(['-', '_'], " ")
        })
        .collect();
    let name = capitalize(words.join(" ").trim());

    let kind = match dir {
        "sections" => "section",
        "snippets" => "snippet",
        "layout" => "layout",
        "templates" => "page template",
        "config" => "configuration",
        "locales" => "translations",
        "assets" => match file.file_type {
            FileType::Style => "stylesheet",
            FileType::Script => "script",
            _ => "asset",
        },
        _ => "",
    };
    if kind.is_empty() {
        name
    } else {
        format!("{name} {kind}")
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
