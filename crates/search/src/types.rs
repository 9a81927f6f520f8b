use serde::{Deserialize, Serialize};

/// Which ranked list contributed a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitSource {
    Keyword,
    Vector,
}

impl HitSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub file_id: String,
    pub path: String,
    pub score: f32,
    pub sources: Vec<HitSource>,
}

impl SearchHit {
    pub fn has_source(&self, source: HitSource) -> bool {
        self.sources.contains(&source)
    }
}

/// Raw similarity hit from a vector backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub file_id: String,
    pub similarity: f32,
}

pub(crate) fn by_score_then_path(a: &SearchHit, b: &SearchHit) -> std::cmp::Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| a.path.cmp(&b.path))
}
