use crate::engine::ContextEngine;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use theme_protocol::FileRecord;
use tokio::sync::RwLock;

pub type SharedEngine = Arc<RwLock<ContextEngine>>;

pub const DEFAULT_ENGINE_CAPACITY: usize = 8;

/// Bounded set of per-project engines, least recently used evicted first.
pub struct EngineRegistry {
    engines: Mutex<LruCache<String, SharedEngine>>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_CAPACITY)
    }
}

impl EngineRegistry {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            engines: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, SharedEngine>> {
        self.engines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn get(&self, project_id: &str) -> Option<SharedEngine> {
        self.lock().get(project_id).cloned()
    }

    pub fn insert(&self, project_id: &str, engine: ContextEngine) -> SharedEngine {
        let engine = Arc::new(RwLock::new(engine));
        if let Some((evicted, _)) = self.lock().push(project_id.to_string(), Arc::clone(&engine)) {
            if evicted != project_id {
                log::debug!("Engine registry evicted {evicted}");
            }
        }
        engine
    }

    /// Cached engine for the project, indexing `files` on a miss.
    pub fn get_or_index(&self, project_id: &str, files: &[FileRecord]) -> SharedEngine {
        if let Some(engine) = self.get(project_id) {
            return engine;
        }
        self.insert(project_id, ContextEngine::from_files(files))
    }

    pub fn remove(&self, project_id: &str) -> Option<SharedEngine> {
        self.lock().pop(project_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_lru_eviction_and_reuse() {
        let registry = EngineRegistry::new(2);
        let files = vec![FileRecord::new("1", "sections/a.liquid", "a")];
        let a = registry.get_or_index("a", &files);
        registry.get_or_index("b", &[]);
        // Touch a so b is the eviction candidate
        assert!(registry.get("a").is_some());
        registry.get_or_index("c", &[]);

        assert_eq!(registry.len(), 2);
        assert!(registry.get("b").is_none());
        let again = registry.get_or_index("a", &[]);
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(again.read().await.len(), 1);
    }
}
