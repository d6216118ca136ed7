//! SQLite store.
//!
//! A single `kv` table keyed by string. Useful when several processes (CLI and
//! server) share one profile directory.

use async_trait::async_trait;
use evoweb_core::error::StorageError;
use evoweb_core::storage::KeyValueStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

pub struct SqliteStore {
    pool: SqlitePool,
}

fn backend_error(context: &str, e: sqlx::Error) -> StorageError {
    StorageError::Backend(format!("{context}: {e}"))
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| backend_error("invalid SQLite path", e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| backend_error("failed to open SQLite", e))?;

        let store = Self::from_pool(pool).await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Wrap an existing pool, creating the schema if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY NOT NULL,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| backend_error("kv table migration", e))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend_error("select", e))?;

        row.map(|r| r.try_get::<String, _>("value"))
            .transpose()
            .map_err(|e| backend_error("decode", e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| backend_error("upsert", e))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| backend_error("delete", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(dir: &tempfile::TempDir) -> SqliteStore {
        let path = dir.path().join("store.db");
        SqliteStore::new(&format!("sqlite://{}", path.display()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upsert_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        assert!(store.get("visitCount").await.unwrap().is_none());
        store.set("visitCount", "1").await.unwrap();
        store.set("visitCount", "2").await.unwrap();
        assert_eq!(store.get("visitCount").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn remove_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        store.set("latest-content", "{}").await.unwrap();
        assert!(store.remove("latest-content").await.unwrap());
        assert!(!store.remove("latest-content").await.unwrap());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        test_store(&dir).await.set("lastVisit", "2026-01-01T00:00:00Z").await.unwrap();

        let reopened = test_store(&dir).await;
        assert_eq!(
            reopened.get("lastVisit").await.unwrap().as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
    }
}
