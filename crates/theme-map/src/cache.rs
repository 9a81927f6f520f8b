use crate::types::ThemeMap;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Bounded registry of the latest theme map snapshot per project.
///
/// Readers get an `Arc` snapshot; writers replace it whole (last writer wins).
pub struct ThemeMapCache {
    maps: Mutex<LruCache<String, Arc<ThemeMap>>>,
}

impl ThemeMapCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            maps: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, project_id: &str) -> Option<Arc<ThemeMap>> {
        self.lock().get(project_id).cloned()
    }

    pub fn put(&self, map: ThemeMap) -> Arc<ThemeMap> {
        let map = Arc::new(map);
        if let Some((evicted, _)) = self.lock().push(map.project_id.clone(), Arc::clone(&map)) {
            if evicted != map.project_id {
                log::debug!("Theme map cache evicted {evicted}");
            }
        }
        map
    }

    pub fn remove(&self, project_id: &str) -> Option<Arc<ThemeMap>> {
        self.lock().pop(project_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<ThemeMap>>> {
        self.maps
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for ThemeMapCache {
    fn default() -> Self {
        Self::new(16)
    }
}
