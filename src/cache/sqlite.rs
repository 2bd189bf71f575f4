//! SQLite-backed cache store.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};

use crate::error::{CacheError, Error, Result};

use super::{CacheLookup, CacheStore};

/// Persistent cache in a single SQLite table
///
/// Expiry is stored as a Unix timestamp in milliseconds. Expired rows read as a
/// miss and are deleted on that read; [`purge_expired`](Self::purge_expired)
/// sweeps the rest.
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Cache(CacheError::ConnectionFailed(format!(
                    "Failed to create cache directory: {}",
                    e
                )))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Cache(CacheError::ConnectionFailed(format!(
                "Failed to open cache database: {}",
                e
            )))
        })?;

        let cache = Self { pool };
        cache.create_schema().await?;

        tracing::debug!(path = %path.display(), "Opened SQLite cache");
        Ok(cache)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Cache(CacheError::MigrationFailed(format!(
                "Failed to create cache_entries table: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Delete every expired row, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = chrono::Utc::now().timestamp_millis();
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Cache(CacheError::QueryFailed(format!(
                    "Failed to purge expired entries: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Cache(CacheError::QueryFailed(format!(
                    "Failed to delete cache entry '{}': {}",
                    key, e
                )))
            })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CacheStore for SqliteCache {
    async fn get(&self, key: &str) -> Result<CacheLookup> {
        let row: Option<(Option<String>, i64)> =
            sqlx::query_as("SELECT value, expires_at FROM cache_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Cache(CacheError::QueryFailed(format!(
                        "Failed to read cache entry '{}': {}",
                        key, e
                    )))
                })?;

        let Some((value, expires_at)) = row else {
            return Ok(CacheLookup::Miss);
        };

        if expires_at <= chrono::Utc::now().timestamp_millis() {
            self.delete(key).await?;
            return Ok(CacheLookup::Miss);
        }

        Ok(match value {
            Some(content) => CacheLookup::Content(content),
            None => CacheLookup::Poisoned,
        })
    }

    async fn put(&self, key: &str, value: Option<&str>, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return self.delete(key).await;
        }

        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = chrono::Utc::now()
            .timestamp_millis()
            .saturating_add(ttl_ms);

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Cache(CacheError::QueryFailed(format!(
                "Failed to write cache entry '{}': {}",
                key, e
            )))
        })?;

        Ok(())
    }
}
