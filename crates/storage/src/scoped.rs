//! Per-visitor view over a shared store.
//!
//! Every key is rewritten to `visitor/<id>/<key>`, so one backing store can
//! hold many visitors' counters and cached pages side by side.

use async_trait::async_trait;
use evoweb_core::error::StorageError;
use evoweb_core::storage::KeyValueStore;
use std::sync::Arc;

pub struct ScopedStore {
    inner: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl ScopedStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, visitor_id: &str) -> Self {
        Self {
            inner,
            prefix: format!("visitor/{visitor_id}/"),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

#[async_trait]
impl KeyValueStore for ScopedStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(&self.key(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set(&self.key(key), value).await
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.remove(&self.key(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;

    #[tokio::test]
    async fn visitors_do_not_see_each_other() {
        let shared = Arc::new(InMemoryStore::new());
        let alice = ScopedStore::new(shared.clone(), "alice");
        let bob = ScopedStore::new(shared.clone(), "bob");

        alice.set("visitCount", "3").await.unwrap();
        assert_eq!(alice.get("visitCount").await.unwrap().as_deref(), Some("3"));
        assert!(bob.get("visitCount").await.unwrap().is_none());
        assert!(!bob.remove("visitCount").await.unwrap());

        // The unscoped key space is untouched too.
        assert!(shared.get("visitCount").await.unwrap().is_none());
        assert_eq!(
            shared.get("visitor/alice/visitCount").await.unwrap().as_deref(),
            Some("3")
        );
        assert_eq!(alice.name(), "memory");
    }
}
