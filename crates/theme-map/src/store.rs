//! Theme map persistence: one JSON document per project.

use crate::error::Result;
use crate::types::ThemeMap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[async_trait]
pub trait ThemeMapStore: Send + Sync {
    async fn load(&self, project_id: &str) -> Result<Option<ThemeMap>>;

    async fn save(&self, map: &ThemeMap) -> Result<()>;

    async fn delete(&self, project_id: &str) -> Result<()>;
}

/// Project ids become file names; anything unusual is replaced.
fn file_stem(project_id: &str) -> String {
    project_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Stores `<dir>/<project>.json`, written through a temp file and rename.
pub struct FsThemeMapStore {
    dir: PathBuf,
}

impl FsThemeMapStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, project_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(project_id)))
    }
}

#[async_trait]
impl ThemeMapStore for FsThemeMapStore {
    async fn load(&self, project_id: &str) -> Result<Option<ThemeMap>> {
        let path = self.path_for(project_id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        let map = serde_json::from_slice(&bytes)?;
        Ok(Some(map))
    }

    async fn save(&self, map: &ThemeMap) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&map.project_id);
        let bytes = serde_json::to_vec_pretty(map)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        log::debug!("Saved theme map {} v{} to {}", map.project_id, map.version, path.display());
        Ok(())
    }

    async fn delete(&self, project_id: &str) -> Result<()> {
        let path = self.path_for(project_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory store keeping serialized documents.
#[derive(Default)]
pub struct MemoryThemeMapStore {
    docs: Mutex<HashMap<String, String>>,
    saves: AtomicUsize,
}

impl MemoryThemeMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ThemeMapStore for MemoryThemeMapStore {
    async fn load(&self, project_id: &str) -> Result<Option<ThemeMap>> {
        let doc = self
            .docs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(project_id)
            .cloned();
        match doc {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, map: &ThemeMap) -> Result<()> {
        let doc = serde_json::to_string(map)?;
        self.docs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(map.project_id.clone(), doc);
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, project_id: &str) -> Result<()> {
        self.docs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(project_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MapStatus;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fs_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FsThemeMapStore::new(dir.path().join("maps"));
        assert!(store.load("shop/1").await.unwrap().is_none());

        let mut map = ThemeMap::new("shop/1");
        map.status = MapStatus::Ready;
        map.version = 4;
        store.save(&map).await.unwrap();

        assert!(store.path_for("shop/1").ends_with("shop_1.json"));
        assert!(!store.path_for("shop/1").with_extension("json.tmp").exists());
        let loaded = store.load("shop/1").await.unwrap().unwrap();
        assert_eq!(loaded, map);

        store.delete("shop/1").await.unwrap();
        store.delete("shop/1").await.unwrap();
        assert!(store.load("shop/1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_counts_saves() {
        let store = MemoryThemeMapStore::new();
        store.save(&ThemeMap::new("a")).await.unwrap();
        store.save(&ThemeMap::new("a")).await.unwrap();
        assert_eq!(store.save_count(), 2);
        assert!(store.load("a").await.unwrap().is_some());
    }
}
