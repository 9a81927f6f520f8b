use crate::types::HitSource;
use std::collections::HashMap;

/// One ranked list entering the fusion.
pub struct RankedList<'a> {
    pub source: HitSource,
    pub weight: f32,
    /// Ids, best first
    pub ids: &'a [String],
}

/// Fused entry: id, score and the lists it appeared in.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedEntry {
    pub id: String,
    pub score: f32,
    pub sources: Vec<HitSource>,
}

/// Reciprocal Rank Fusion
///
/// score(d) = Σ weight_i / (k + rank_i(d)), rank starting at 1.
/// Contributions add up when a document shows up in several lists.
pub struct RrfFusion {
    k: f32,
}

impl RrfFusion {
    pub fn new(k: f32) -> Self {
        Self { k }
    }

    pub fn contribution(&self, weight: f32, rank: usize) -> f32 {
        weight / (self.k + rank as f32 + 1.0)
    }

    /// Returns entries sorted by fused score descending, ties by id.
    pub fn fuse(&self, lists: &[RankedList<'_>]) -> Vec<FusedEntry> {
        let mut fused: HashMap<&str, FusedEntry> = HashMap::new();
        for list in lists {
            for (rank, id) in list.ids.iter().enumerate() {
                let entry = fused.entry(id.as_str()).or_insert_with(|| FusedEntry {
                    id: id.clone(),
                    score: 0.0,
                    sources: Vec::new(),
                });
                // First occurrence wins if a list repeats an id
                if entry.sources.contains(&list.source) {
                    continue;
                }
                entry.score += self.contribution(list.weight, rank);
                entry.sources.push(list.source);
            }
        }

        let mut out: Vec<FusedEntry> = fused.into_values().collect();
        for entry in &mut out {
            entry.sources.sort();
        }
        out.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self::new(60.0)
    }
}
