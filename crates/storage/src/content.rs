//! Cache of the last generated page.

use std::sync::Arc;

use evoweb_core::error::StorageError;
use evoweb_core::storage::{CachedContent, KeyValueStore, LATEST_CONTENT_KEY};

use crate::ScopedStore;

/// Reads and replaces the `latest-content` entry.
#[derive(Clone)]
pub struct ContentCache {
    store: Arc<dyn KeyValueStore>,
}

impl ContentCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The cache of one visitor's last page.
    pub fn for_visitor(&self, visitor_id: &str) -> Self {
        Self::new(Arc::new(ScopedStore::new(self.store.clone(), visitor_id)))
    }

    /// Replace the cached page.
    pub async fn save(&self, content: &CachedContent) -> Result<(), StorageError> {
        let json = serde_json::to_string(content).map_err(|e| StorageError::Serialization {
            key: LATEST_CONTENT_KEY.into(),
            reason: e.to_string(),
        })?;
        self.store.set(LATEST_CONTENT_KEY, &json).await
    }

    /// The cached page, if any. A value that no longer parses is reported as
    /// a serialization error rather than silently dropped.
    pub async fn load_latest(&self) -> Result<Option<CachedContent>, StorageError> {
        let Some(raw) = self.store.get(LATEST_CONTENT_KEY).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Serialization {
                key: LATEST_CONTENT_KEY.into(),
                reason: e.to_string(),
            })
    }

    pub async fn clear(&self) -> Result<bool, StorageError> {
        self.store.remove(LATEST_CONTENT_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;

    #[tokio::test]
    async fn empty_cache_has_no_content() {
        let cache = ContentCache::new(Arc::new(InMemoryStore::new()));
        assert!(cache.load_latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_previous() {
        let cache = ContentCache::new(Arc::new(InMemoryStore::new()));
        cache.save(&CachedContent::now("<p>one</p>")).await.unwrap();
        cache.save(&CachedContent::now("<p>two</p>")).await.unwrap();

        let latest = cache.load_latest().await.unwrap().unwrap();
        assert_eq!(latest.html, "<p>two</p>");
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_serialization_error() {
        let store = Arc::new(InMemoryStore::new());
        store.set(LATEST_CONTENT_KEY, "<p>raw html</p>").await.unwrap();

        let cache = ContentCache::new(store);
        assert!(matches!(
            cache.load_latest().await,
            Err(StorageError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn visitor_caches_are_separate() {
        let cache = ContentCache::new(Arc::new(InMemoryStore::new()));
        cache
            .for_visitor("alice")
            .save(&CachedContent::now("<p>alice</p>"))
            .await
            .unwrap();

        assert!(cache.for_visitor("carol").load_latest().await.unwrap().is_none());
        assert!(cache.load_latest().await.unwrap().is_none());
        let alice = cache.for_visitor("alice").load_latest().await.unwrap().unwrap();
        assert_eq!(alice.html, "<p>alice</p>");
    }

    #[tokio::test]
    async fn clear_removes_entry() {
        let cache = ContentCache::new(Arc::new(InMemoryStore::new()));
        cache.save(&CachedContent::now("<p>x</p>")).await.unwrap();
        assert!(cache.clear().await.unwrap());
        assert!(cache.load_latest().await.unwrap().is_none());
    }
}
