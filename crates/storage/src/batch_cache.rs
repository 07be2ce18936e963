//! Persistent batch cache using SQLite with sqlx.
//!
//! Stores the raw JSON payload of each fetched batch keyed by batch number,
//! together with the time it was written. Entries older than the retention
//! window are treated as absent and deleted lazily on read, or in bulk by
//! [`BatchStore::prune_expired`].
//!
//! The cache is an optimization only: read failures are reported as misses
//! and never surface to callers.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default retention window for cached batches.
pub const DEFAULT_RETENTION_HOURS: i64 = 12;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Configuration for the persistent cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// How long an entry stays valid after it was written
    pub retention: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/batch-cache.db"),
            retention: Duration::hours(DEFAULT_RETENTION_HOURS),
        }
    }
}

/// One cached batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedBatch {
    pub batch_number: u32,
    /// Raw batch payload as received from the network
    pub data: String,
    /// When the entry was written
    pub timestamp: DateTime<Utc>,
}

/// Key-value store of batch payloads.
///
/// Each batch number is an independent key and writes are idempotent, so
/// concurrent `get`/`set` calls for different batches need no coordination.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Cached payload, or `None` on miss, expiry, or storage failure.
    async fn get(&self, batch_number: u32) -> Option<CachedBatch>;

    /// Write (or overwrite) a payload, stamped with the current time.
    async fn set(&self, batch_number: u32, data: &str) -> Result<()>;

    async fn delete(&self, batch_number: u32) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    /// Delete every expired entry, returning how many were removed.
    async fn prune_expired(&self) -> Result<u64>;
}

/// SQLite-backed [`BatchStore`].
pub struct PersistentBatchCache {
    pool: SqlitePool,
    retention: Duration,
}

impl PersistentBatchCache {
    /// Open or create the cache database described by `config`.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        Self::open_path(&config.path, config.retention).await
    }

    /// Open or create the cache database at the given path.
    pub async fn open_path(path: &Path, retention: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let cache = Self { pool, retention };
        cache.create_schema().await?;

        info!(path = %path.display(), "Opened batch cache database");
        Ok(cache)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory(retention: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        // A single connection that never recycles keeps the in-memory
        // database alive for the lifetime of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let cache = Self { pool, retention };
        cache.create_schema().await?;
        Ok(cache)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS batches (
                batch_number INTEGER PRIMARY KEY,
                data TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_batches_timestamp ON batches(timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Write an entry with an explicit timestamp.
    ///
    /// Used when importing payloads whose fetch time is already known.
    pub async fn set_with_timestamp(
        &self,
        batch_number: u32,
        data: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO batches (batch_number, data, timestamp)
            VALUES (?, ?, ?)
            ON CONFLICT(batch_number) DO UPDATE SET data = excluded.data, timestamp = excluded.timestamp
            "#,
        )
        .bind(batch_number as i64)
        .bind(data)
        .bind(timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        debug!(batch = batch_number, bytes = data.len(), "Cached batch");
        Ok(())
    }

    /// Number of stored entries, expired or not.
    pub async fn len(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM batches")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Close the underlying pool. Subsequent reads behave as misses.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn cutoff_millis(&self) -> i64 {
        (Utc::now() - self.retention).timestamp_millis()
    }

    async fn fetch(&self, batch_number: u32) -> Result<Option<(String, i64)>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT data, timestamp FROM batches WHERE batch_number = ?")
                .bind(batch_number as i64)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }
}

#[async_trait]
impl BatchStore for PersistentBatchCache {
    async fn get(&self, batch_number: u32) -> Option<CachedBatch> {
        let (data, millis) = match self.fetch(batch_number).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                debug!(batch = batch_number, "Batch cache miss");
                return None;
            }
            Err(e) => {
                warn!(batch = batch_number, error = %e, "Batch cache read failed, treating as miss");
                return None;
            }
        };

        if millis < self.cutoff_millis() {
            debug!(batch = batch_number, "Cached batch expired");
            if let Err(e) = self.delete(batch_number).await {
                warn!(batch = batch_number, error = %e, "Failed to delete expired batch");
            }
            return None;
        }

        let timestamp = Utc.timestamp_millis_opt(millis).single()?;
        debug!(batch = batch_number, "Batch cache hit");
        Some(CachedBatch {
            batch_number,
            data,
            timestamp,
        })
    }

    async fn set(&self, batch_number: u32, data: &str) -> Result<()> {
        self.set_with_timestamp(batch_number, data, Utc::now()).await
    }

    async fn delete(&self, batch_number: u32) -> Result<()> {
        sqlx::query("DELETE FROM batches WHERE batch_number = ?")
            .bind(batch_number as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM batches").execute(&self.pool).await?;
        info!("Cleared batch cache");
        Ok(())
    }

    async fn prune_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM batches WHERE timestamp < ?")
            .bind(self.cutoff_millis())
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(removed = removed, "Pruned expired batches");
        }
        Ok(removed)
    }
}
