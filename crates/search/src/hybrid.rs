use crate::config::HybridConfig;
use crate::error::Result;
use crate::fusion::{RankedList, RrfFusion};
use crate::keyword::keyword_search;
use crate::types::{by_score_then_path, HitSource, SearchHit};
use crate::vector::VectorSearch;
use std::collections::HashMap;
use std::sync::Arc;
use theme_protocol::FileRecord;

/// Keyword search fused with vector similarity.
///
/// Keyword search always runs. Vector results are fused in only when the
/// backend is enabled, available and returns something above the similarity
/// threshold; otherwise the keyword ranking is returned as is.
pub struct HybridSearch {
    config: HybridConfig,
    vector: Option<Arc<dyn VectorSearch>>,
    fusion: RrfFusion,
}

impl HybridSearch {
    pub fn new(config: HybridConfig, vector: Option<Arc<dyn VectorSearch>>) -> Self {
        Self {
            fusion: RrfFusion::new(config.k),
            config,
            vector,
        }
    }

    pub fn keyword_only() -> Self {
        Self::new(HybridConfig::keyword_only(), None)
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    pub async fn search(
        &self,
        query: &str,
        files: &[FileRecord],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Ok(keyword_search(query, files, limit));
        }

        log::debug!("Hybrid search: query='{query}', limit={limit}");
        let pool = self.config.pool_size(limit);
        let keyword = keyword_search(query, files, pool);

        let vector_ids = match self.vector_candidates(query, files, pool).await {
            Some(ids) if !ids.is_empty() => ids,
            _ => {
                let mut hits = keyword;
                hits.truncate(limit);
                return Ok(hits);
            }
        };

        let keyword_ids: Vec<String> = keyword.iter().map(|h| h.file_id.clone()).collect();
        let fused = self.fusion.fuse(&[
            RankedList {
                source: HitSource::Vector,
                weight: self.config.vector_weight,
                ids: &vector_ids,
            },
            RankedList {
                source: HitSource::Keyword,
                weight: self.config.keyword_weight,
                ids: &keyword_ids,
            },
        ]);

        let paths: HashMap<&str, &str> = files
            .iter()
            .map(|f| (f.id.as_str(), f.path.as_str()))
            .collect();
        let mut hits: Vec<SearchHit> = fused
            .into_iter()
            .filter_map(|entry| {
                let path = paths.get(entry.id.as_str())?;
                Some(SearchHit {
                    path: (*path).to_string(),
                    file_id: entry.id,
                    score: entry.score,
                    sources: entry.sources,
                })
            })
            .collect();
        hits.sort_by(by_score_then_path);
        hits.truncate(limit);

        log::debug!(
            "Fused {} vector and {} keyword candidates into {} hits",
            vector_ids.len(),
            keyword_ids.len(),
            hits.len()
        );
        Ok(hits)
    }

    /// Vector ids above the threshold, restricted to `files`. `None` means the
    /// vector side is off or failed.
    async fn vector_candidates(
        &self,
        query: &str,
        files: &[FileRecord],
        pool: usize,
    ) -> Option<Vec<String>> {
        if !self.config.vector_enabled {
            return None;
        }
        let vector = self.vector.as_ref()?;
        if !vector.is_available().await {
            log::debug!("Vector search unavailable, using keyword results");
            return None;
        }
        let hits = match vector.search(query, pool).await {
            Ok(hits) => hits,
            Err(err) => {
                log::warn!("Vector search failed, using keyword results: {err}");
                return None;
            }
        };
        let known: std::collections::HashSet<&str> = files.iter().map(|f| f.id.as_str()).collect();
        Some(
            hits.into_iter()
                .filter(|h| h.similarity >= self.config.similarity_threshold)
                .filter(|h| known.contains(h.file_id.as_str()))
                .map(|h| h.file_id)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::types::VectorHit;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct FixedVectors(Vec<VectorHit>);

    #[async_trait]
    impl VectorSearch for FixedVectors {
        async fn is_available(&self) -> bool {
            true
        }

        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<VectorHit>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl VectorSearch for Broken {
        async fn is_available(&self) -> bool {
            true
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<VectorHit>> {
            Err(SearchError::VectorUnavailable("timeout".to_string()))
        }
    }

    fn files() -> Vec<FileRecord> {
        vec![
            FileRecord::new("1", "sections/cart-drawer.liquid", "<cart-drawer>"),
            FileRecord::new("2", "snippets/cart-item.liquid", "{{ item.title }}"),
            FileRecord::new("3", "assets/component-cart.css", ".drawer { }"),
            FileRecord::new("4", "layout/theme.liquid", "{{ content_for_layout }}"),
        ]
    }

    fn hit(id: &str, similarity: f32) -> VectorHit {
        VectorHit {
            file_id: id.to_string(),
            similarity,
        }
    }

    #[tokio::test]
    async fn test_fuses_both_sources() {
        let vectors = FixedVectors(vec![hit("4", 0.9), hit("1", 0.8), hit("2", 0.1)]);
        let search = HybridSearch::new(HybridConfig::default(), Some(Arc::new(vectors)));
        let hits = search.search("cart drawer", &files(), 10).await.unwrap();

        assert_eq!(hits[0].path, "sections/cart-drawer.liquid");
        assert_eq!(hits[0].sources, vec![HitSource::Keyword, HitSource::Vector]);
        assert!(hits.iter().any(|h| h.file_id == "4" && h.sources == vec![HitSource::Vector]));
        // Below the similarity threshold and only in the vector list
        assert!(!hits.iter().any(|h| h.file_id == "2" && h.has_source(HitSource::Vector)));
    }

    #[tokio::test]
    async fn test_failure_degrades_to_keyword() {
        let search = HybridSearch::new(HybridConfig::default(), Some(Arc::new(Broken)));
        let hits = search.search("cart", &files(), 2).await.unwrap();
        assert_eq!(hits, keyword_search("cart", &files(), 2));
    }

    #[tokio::test]
    async fn test_blank_query_matches_keyword_search() {
        let search = HybridSearch::new(HybridConfig::default(), Some(Arc::new(Broken)));
        let hits = search.search(" ", &files(), 5).await.unwrap();
        assert_eq!(hits, keyword_search(" ", &files(), 5));
        assert!(hits.is_empty());
    }
}
