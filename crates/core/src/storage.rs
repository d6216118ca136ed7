//! Storage trait for the persistence collaborator.
//!
//! The pipeline only needs get/set by key. Values are strings; structured
//! values are stored as JSON.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Key holding the last generated page.
pub const LATEST_CONTENT_KEY: &str = "latest-content";
/// Key holding the visit counter (decimal string).
pub const VISIT_COUNT_KEY: &str = "visitCount";
/// Key holding the last visit timestamp (ISO-8601).
pub const LAST_VISIT_KEY: &str = "lastVisit";

/// The last generated page. Replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedContent {
    pub html: String,
    pub generated_at: DateTime<Utc>,
}

impl CachedContent {
    pub fn now(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            generated_at: Utc::now(),
        }
    }
}

/// String key/value storage.
///
/// Implementations: in-memory (tests, ephemeral sessions), JSON file, SQLite.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// The backend name (e.g. "memory", "file", "sqlite").
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError>;

    /// Overwrite `key` with `value`.
    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), StorageError>;

    /// Remove `key`. Returns whether it existed.
    async fn remove(&self, key: &str) -> std::result::Result<bool, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_content_serialization() {
        let content = CachedContent::now("<p>hello</p>");
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["html"], "<p>hello</p>");
        assert!(json["generatedAt"].is_string());
    }
}
