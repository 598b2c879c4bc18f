//! Durable TTL cache for catalog responses, backed by SQLite.
//!
//! One keyed table holds the raw JSON payload per fetch-request hash. Expiry
//! is checked atomically inside [`SqliteCache::get`]: an entry older than the
//! TTL is deleted in the same transaction and reported absent, so callers can
//! never observe a stale value. Storage failures surface loudly - the fetch
//! layer depends on cache correctness to avoid duplicate upstream calls, so a
//! silent no-cache fallback is not acceptable.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, instrument};

/// Kept low since SQLite serializes writers at file level anyway.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in milliseconds; connections wait this long before
/// returning SQLITE_BUSY.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Cache storage errors.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The underlying store is unreachable or a statement failed.
    #[error("cache storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// A stored payload is not valid JSON.
    #[error("cache payload corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Thread-safe key/value store with per-entry creation time and a shared TTL.
///
/// Values are JSON payloads; keys are content hashes of the fetch request
/// that produced them. Survives process restarts.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
    ttl: Duration,
}

impl SqliteCache {
    /// Opens (creating if needed) the cache database at `db_path`.
    ///
    /// Enables WAL mode for concurrent reads and sets a busy timeout, then
    /// creates the cache table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the database cannot be opened or
    /// initialized.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path, ttl: Duration) -> Result<Self, CacheError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool, ttl })
    }

    /// Creates an in-memory cache for tests. WAL mode is pointless for
    /// in-memory databases and is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the connection fails.
    #[instrument]
    pub async fn new_in_memory(ttl: Duration) -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::init_schema(&pool).await?;
        Ok(Self { pool, ttl })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at REAL NOT NULL,
                hits INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Looks up `key`, purging the entry first if it has outlived the TTL.
    ///
    /// Expiry check, purge, and hit-count update run in one transaction so a
    /// concurrent reader never sees a half-applied state.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on storage failure or a corrupt stored payload.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, f64)> =
            sqlx::query_as("SELECT value, created_at FROM cache WHERE key = ?")
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((payload, created_at)) = row else {
            return Ok(None);
        };

        if now_secs() - created_at > self.ttl.as_secs_f64() {
            sqlx::query("DELETE FROM cache WHERE key = ?")
                .bind(key)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            debug!(key, "Cache entry expired");
            return Ok(None);
        }

        sqlx::query("UPDATE cache SET hits = hits + 1 WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(serde_json::from_str(&payload)?))
    }

    /// Upserts `key`: inserts if unseen, otherwise overwrites the value and
    /// resets the creation timestamp (restarting the TTL clock).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on storage failure.
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO cache(key, value, created_at, hits)
             VALUES (?, ?, ?, 0)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 created_at = excluded.created_at",
        )
        .bind(key)
        .bind(payload)
        .bind(now_secs())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] on storage failure.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache").execute(&self.pool).await?;
        Ok(())
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn round_trip_within_ttl() {
        let cache = SqliteCache::new_in_memory(Duration::from_secs(3600))
            .await
            .unwrap();
        cache.set("abc", &json!({"x": 1})).await.unwrap();
        assert_eq!(cache.get("abc").await.unwrap(), Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn expired_entry_is_absent_and_stays_absent() {
        let cache = SqliteCache::new_in_memory(Duration::from_millis(20))
            .await
            .unwrap();
        cache.set("k", &json!([1, 2])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        // Purge is permanent; the value must not resurrect.
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_overwrites_and_keeps_latest_only() {
        let cache = SqliteCache::new_in_memory(Duration::from_secs(3600))
            .await
            .unwrap();
        cache.set("k", &json!("old")).await.unwrap();
        cache.set("k", &json!("new")).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!("new")));
    }

    #[tokio::test]
    async fn overwrite_restarts_ttl_clock() {
        let cache = SqliteCache::new_in_memory(Duration::from_millis(120))
            .await
            .unwrap();
        cache.set("k", &json!(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.set("k", &json!(2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        // 160ms after first set, but only 80ms after the overwrite.
        assert_eq!(cache.get("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let cache = SqliteCache::new_in_memory(Duration::from_secs(3600))
            .await
            .unwrap();
        cache.set("a", &json!(1)).await.unwrap();
        cache.set("b", &json!(2)).await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(cache.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("cache.sqlite3");
        {
            let cache = SqliteCache::new(&path, Duration::from_secs(3600))
                .await
                .unwrap();
            cache.set("k", &json!({"v": true})).await.unwrap();
        }
        let reopened = SqliteCache::new(&path, Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), Some(json!({"v": true})));
    }
}
