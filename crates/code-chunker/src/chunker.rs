use crate::cache::{CacheStats, ChunkCache};
use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::script::{ScriptGrammarStrategy, ScriptRegexStrategy};
use crate::settings::{JsonGrammarStrategy, JsonRegexStrategy};
use crate::strategy::{ChunkStrategy, StrategyChain, WholeFileStrategy};
use crate::style::{StyleGrammarStrategy, StyleRegexStrategy};
use crate::template::{LiquidGrammarStrategy, LiquidRegexStrategy};
use crate::types::{Chunk, ChunkMetadata};
use std::sync::Arc;
use theme_protocol::{content_hash, FileRecord, FileType};

/// Main chunker interface: routes a file to its strategy chain and caches the
/// result by `(path, content hash)`.
pub struct Chunker {
    config: ChunkerConfig,
    cache: ChunkCache,
    templates: StrategyChain,
    styles: StrategyChain,
    scripts: StrategyChain,
    configs: StrategyChain,
    fallback: StrategyChain,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::build(ChunkerConfig::default())
    }
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        Ok(Self::build(config))
    }

    fn build(config: ChunkerConfig) -> Self {
        let chain = |grammar: Box<dyn ChunkStrategy>, regex: Box<dyn ChunkStrategy>| {
            let mut strategies = Vec::with_capacity(3);
            if config.grammar_pass {
                strategies.push(grammar);
            }
            strategies.push(regex);
            strategies.push(Box::new(WholeFileStrategy) as Box<dyn ChunkStrategy>);
            StrategyChain::new(strategies)
        };

        Self {
            cache: ChunkCache::new(config.cache_capacity),
            templates: chain(Box::new(LiquidGrammarStrategy), Box::new(LiquidRegexStrategy)),
            styles: chain(
                Box::new(StyleGrammarStrategy {
                    scss_line_comments: config.scss_line_comments,
                }),
                Box::new(StyleRegexStrategy),
            ),
            scripts: chain(Box::new(ScriptGrammarStrategy), Box::new(ScriptRegexStrategy)),
            configs: chain(Box::new(JsonGrammarStrategy), Box::new(JsonRegexStrategy)),
            fallback: StrategyChain::new(vec![Box::new(WholeFileStrategy)]),
            config,
        }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    fn chain_for(&self, file_type: FileType) -> &StrategyChain {
        match file_type {
            FileType::Template => &self.templates,
            FileType::Style => &self.styles,
            FileType::Script => &self.scripts,
            FileType::Config => &self.configs,
            FileType::Other => &self.fallback,
        }
    }

    /// Chunk one file. Never fails; empty content yields no chunks.
    pub fn chunk(&self, path: &str, content: &str) -> Arc<Vec<Chunk>> {
        self.chunk_with_hash(path, content, &content_hash(content))
    }

    /// Same as [`Chunker::chunk`] when the caller already knows the hash.
    pub fn chunk_with_hash(&self, path: &str, content: &str, hash: &str) -> Arc<Vec<Chunk>> {
        if let Some(cached) = self.cache.get(path, hash) {
            log::debug!("chunk cache hit: {path}");
            return cached;
        }

        let chunks = if content.trim().is_empty() {
            Vec::new()
        } else {
            let chain = self.chain_for(FileType::from_path(path));
            Self::post_process(chain.run(path, content))
        };
        let chunks = Arc::new(chunks);
        self.cache.insert(path, hash, Arc::clone(&chunks));
        chunks
    }

    pub fn chunk_record(&self, file: &FileRecord) -> Arc<Vec<Chunk>> {
        self.chunk(&file.path, &file.content)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn post_process(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
        chunks.sort_by(|a, b| {
            a.line_start
                .cmp(&b.line_start)
                .then_with(|| b.line_end.cmp(&a.line_end))
                .then_with(|| a.kind.cmp(&b.kind))
        });
        for chunk in &mut chunks {
            chunk.metadata.estimated_tokens =
                ChunkMetadata::estimate_tokens_from_content(&chunk.content);
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkKind, ParseSource};

    #[test]
    fn test_routes_by_file_type() {
        let chunker = Chunker::default();

        let css = chunker.chunk("assets/base.css", ".a { color: red; }\n.b { color: blue; }\n");
        assert!(css.iter().all(|c| c.kind == ChunkKind::Rule));
        assert_eq!(css.len(), 2);

        let other = chunker.chunk("assets/logo.svg", "<svg></svg>\n");
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].kind, ChunkKind::WholeFile);

        let markup = chunker.chunk("snippets/plain.liquid", "<p>{{ 'hello' | t }}</p>\n");
        assert_eq!(markup.len(), 1);
        assert_eq!(markup[0].kind, ChunkKind::WholeFile);
    }

    #[test]
    fn test_empty_content_has_no_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.chunk("assets/base.css", "").is_empty());
        assert!(chunker.chunk("assets/base.css", "  \n").is_empty());
    }

    #[test]
    fn test_identical_content_is_served_from_cache() {
        let chunker = Chunker::default();
        let first = chunker.chunk("assets/base.css", ".a { }");
        let second = chunker.chunk("assets/base.css", ".a { }");
        assert!(Arc::ptr_eq(&first, &second));

        let stats = chunker.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);

        // Different content, different entry
        let third = chunker.chunk("assets/base.css", ".a { x: y }");
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_regex_only_config_skips_grammar() {
        let chunker = Chunker::new(ChunkerConfig::regex_only()).unwrap();
        let chunks = chunker.chunk("assets/a.css", ".a {\n  x: y;\n}\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.source, ParseSource::Regex);
    }

    #[test]
    fn test_tokens_are_estimated() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk("assets/a.css", ".abcdefgh { color: red; }");
        assert_eq!(chunks[0].estimated_tokens(), 25 / 4);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ChunkerConfig {
            cache_capacity: 0,
            ..Default::default()
        };
        assert!(Chunker::new(config).is_err());
    }
}
