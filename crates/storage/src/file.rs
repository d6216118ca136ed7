//! File-backed store: one JSON object holding every key.
//!
//! Entries are loaded on creation and the whole object is rewritten on every
//! mutation, so reads are served from memory and writes are durable before
//! they return.
//!
//! Default location: `~/.evoweb/store.json`

use async_trait::async_trait;
use evoweb_core::error::StorageError;
use evoweb_core::storage::KeyValueStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub struct FileStore {
    path: PathBuf,
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file starts empty and is created
    /// on first write; an unreadable or corrupt file also starts empty.
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "File store loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return BTreeMap::new(),
        };
        if content.trim().is_empty() {
            return BTreeMap::new();
        }
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt store file");
            BTreeMap::new()
        })
    }

    fn io_error(&self, e: impl std::fmt::Display) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let content = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Serialization {
            key: "*".into(),
            reason: e.to_string(),
        })?;

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(key);
        self.flush(&next).await?;
        *entries = next;
        Ok(true)
    }
}
