use serde::{Deserialize, Serialize};

/// Tuning for keyword + vector fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// RRF constant
    pub k: f32,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    /// Minimum cosine similarity for a vector hit to be fused
    pub similarity_threshold: f32,
    pub vector_enabled: bool,
    /// Candidate pool is `pool_factor × limit` per source
    pub pool_factor: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            k: 60.0,
            vector_weight: 1.0,
            keyword_weight: 0.6,
            similarity_threshold: 0.25,
            vector_enabled: true,
            pool_factor: 5,
        }
    }
}

impl HybridConfig {
    #[must_use]
    pub fn keyword_only() -> Self {
        Self {
            vector_enabled: false,
            ..Self::default()
        }
    }

    pub(crate) fn pool_size(&self, limit: usize) -> usize {
        limit.saturating_mul(self.pool_factor.max(1))
    }
}
