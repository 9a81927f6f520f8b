use crate::error::Result;
use crate::lines::LineIndex;
use crate::types::{Chunk, ChunkKind, ChunkMetadata, ParseSource};

/// One way of splitting a file into chunks.
///
/// Strategies are pure: same input, same output. Returning `Ok(vec![])` means
/// "nothing recognizable here" and lets the next strategy try.
pub trait ChunkStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn chunk(&self, path: &str, content: &str) -> Result<Vec<Chunk>>;
}

/// Ordered strategies; the first non-empty `Ok` wins.
pub struct StrategyChain {
    strategies: Vec<Box<dyn ChunkStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn ChunkStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, path: &str, content: &str) -> Vec<Chunk> {
        for strategy in &self.strategies {
            match strategy.chunk(path, content) {
                Ok(chunks) if !chunks.is_empty() => {
                    log::debug!(
                        "{path}: {} produced {} chunks",
                        strategy.name(),
                        chunks.len()
                    );
                    return chunks;
                }
                Ok(_) => {
                    log::debug!("{path}: {} found no structure", strategy.name());
                }
                Err(e) => {
                    log::warn!("{path}: {} failed, falling back: {e}", strategy.name());
                }
            }
        }
        Vec::new()
    }
}

/// One chunk covering the whole file. Terminates every chain.
pub struct WholeFileStrategy;

impl ChunkStrategy for WholeFileStrategy {
    fn name(&self) -> &'static str {
        "whole-file"
    }

    fn chunk(&self, path: &str, content: &str) -> Result<Vec<Chunk>> {
        if content.is_empty() {
            return Ok(Vec::new());
        }
        let lines = LineIndex::new(content).line_count();
        Ok(vec![Chunk::new(
            ChunkKind::WholeFile,
            path.to_string(),
            1,
            lines.max(1),
            content.to_string(),
            ChunkMetadata::from_source(ParseSource::Whole),
        )])
    }
}
