use crate::error::{Result, SearchError};
use crate::keyword::query_terms;
use crate::types::VectorHit;
use async_trait::async_trait;
use std::sync::RwLock;
use theme_protocol::FileRecord;

/// Turns text into fixed-size vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Similarity search over some embedding backend.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Whether the backend can answer queries right now.
    async fn is_available(&self) -> bool;

    /// Hits sorted by similarity, best first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<VectorHit>>;
}

/// Deterministic offline embedder.
///
/// Each word maps to a pseudo-random unit vector seeded by its hash; a text is
/// the normalized sum of its words, so texts sharing words score close.
#[derive(Debug, Clone, Copy)]
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    pub const DEFAULT_DIMENSION: usize = 64;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        for term in query_terms(text) {
            for (slot, value) in vec.iter_mut().zip(stub_embed(&term, self.dimension)) {
                *slot += value;
            }
        }
        normalize(&mut vec);
        vec
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

struct IndexedFile {
    file_id: String,
    vector: Vec<f32>,
}

/// Brute-force cosine index over whole files.
pub struct InMemoryVectorIndex<E: Embedder> {
    embedder: E,
    entries: RwLock<Vec<IndexedFile>>,
}

/// Characters of content embedded per file
const EMBED_CHARS: usize = 2_000;

impl<E: Embedder> InMemoryVectorIndex<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Embed and (re)insert files. Stubs are indexed by path only.
    pub async fn index_files(&self, files: &[FileRecord]) -> Result<usize> {
        if files.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = files
            .iter()
            .map(|f| {
                let excerpt: String = f.content.chars().take(EMBED_CHARS).collect();
                format!("{}\n{excerpt}", f.path)
            })
            .collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != files.len() {
            return Err(SearchError::EmbeddingError(format!(
                "expected {} vectors, got {}",
                files.len(),
                vectors.len()
            )));
        }

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (file, vector) in files.iter().zip(vectors) {
            entries.retain(|e| e.file_id != file.id);
            entries.push(IndexedFile {
                file_id: file.id.clone(),
                vector,
            });
        }
        log::debug!("Vector index holds {} files", entries.len());
        Ok(files.len())
    }

    pub fn remove(&self, file_id: &str) -> bool {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| e.file_id != file_id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<E: Embedder> VectorSearch for InMemoryVectorIndex<E> {
    async fn is_available(&self) -> bool {
        !self.is_empty()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<VectorHit>> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let mut vectors = self.embedder.embed_batch(&[query.to_string()]).await?;
        let query_vec = vectors
            .pop()
            .ok_or_else(|| SearchError::EmbeddingError("no vector for query".to_string()))?;

        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut hits: Vec<VectorHit> = entries
            .iter()
            .map(|e| VectorHit {
                file_id: e.file_id.clone(),
                similarity: cosine_similarity(&query_vec, &e.vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_id.cmp(&b.file_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
