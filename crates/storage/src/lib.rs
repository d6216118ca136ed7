//! Persistence for EvoWeb.
//!
//! [`KeyValueStore`] backends (memory, JSON file, SQLite) plus the two typed
//! views the pipeline uses: [`ContentCache`] and [`VisitTracker`]. Both views
//! can be narrowed to one visitor through [`ScopedStore`].
//!
//! [`KeyValueStore`]: evoweb_core::storage::KeyValueStore

pub mod content;
pub mod file;
pub mod in_memory;
pub mod scoped;
pub mod visits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use content::ContentCache;
pub use file::FileStore;
pub use in_memory::InMemoryStore;
pub use scoped::ScopedStore;
pub use visits::VisitTracker;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use std::sync::Arc;

use evoweb_config::StorageConfig;
use evoweb_core::error::StorageError;
use evoweb_core::storage::KeyValueStore;

/// Open the store selected by configuration.
pub async fn build_from_config(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    let store: Arc<dyn KeyValueStore> = match config.backend.as_str() {
        "memory" => Arc::new(InMemoryStore::new()),
        "file" => Arc::new(FileStore::new(config.path.clone())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            if let Some(parent) = config.path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| StorageError::Io {
                    path: parent.display().to_string(),
                    reason: e.to_string(),
                })?;
            }
            let url = format!("sqlite://{}", config.path.display());
            Arc::new(SqliteStore::new(&url).await?)
        }
        other => {
            return Err(StorageError::Backend(format!(
                "storage backend '{other}' is not available in this build"
            )));
        }
    };
    tracing::debug!(backend = store.name(), "Storage ready");
    Ok(store)
}
