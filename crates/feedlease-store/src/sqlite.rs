//! SQLite lease store implementation
//!
//! ## What Does This Do?
//!
//! Persists one lease record per partition and arbitrates every ownership
//! race with conditional writes:
//!
//! - **Acquire**: upsert that only flips `owner_id` when the record is free,
//!   expired, or already ours - then a read-back verifies who won
//! - **Renew**: `UPDATE ... WHERE owner_id = ? AND expires_at_ms > now`
//! - **Checkpoint**: `UPDATE ... WHERE owner_id = ? AND epoch <= new_epoch`
//!
//! SQLite serializes writers, so the conditional upsert is atomic even when
//! several consumer processes share one database file.
//!
//! ## Why SQLite?
//!
//! For single-node fleets (several consumer processes on one host) SQLite is
//! ideal: embedded, zero configuration, ACID, and trivially replaced by a
//! server-backed implementation of the same trait later.
//!
//! ## Usage
//!
//! ```ignore
//! use feedlease_store::{LeaseStore, SqliteLeaseStore};
//!
//! // File-based (production)
//! let store = SqliteLeaseStore::new("leases.db").await?;
//!
//! // In-memory (testing)
//! let store = SqliteLeaseStore::new_in_memory().await?;
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use feedlease_core::{now_ms, ContinuationToken, Lease, PartitionId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::debug;

use crate::error::Result;
use crate::LeaseStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS partition_leases (
    partition_id INTEGER PRIMARY KEY,
    owner_id TEXT,
    expires_at_ms INTEGER NOT NULL,
    continuation TEXT,
    epoch INTEGER
)
";

/// SQLite-backed [`LeaseStore`] implementation.
pub struct SqliteLeaseStore {
    pool: SqlitePool,
}

impl SqliteLeaseStore {
    /// Open (or create) a file-backed lease store.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))?
                .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Create an in-memory store (for testing).
    ///
    /// Pinned to a single connection - each SQLite `:memory:` connection is
    /// its own database.
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn lease_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Lease> {
        let partition_id: i64 = row.try_get("partition_id")?;
        let continuation: Option<String> = row.try_get("continuation")?;
        Ok(Lease {
            partition_id: PartitionId::new(partition_id as u32),
            owner_id: row.try_get("owner_id")?,
            expires_at_ms: row.try_get("expires_at_ms")?,
            continuation: continuation.map(ContinuationToken::new),
        })
    }
}

#[async_trait]
impl LeaseStore for SqliteLeaseStore {
    async fn try_acquire(
        &self,
        partition: PartitionId,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let now = now_ms();
        let expires_at = now + ttl.as_millis() as i64;

        // Conditional upsert: the owner column only changes when the record
        // is free, expired, or already ours. SQLite serializes writers, so
        // this is the atomic arbitration point between competing processes.
        sqlx::query(
            "INSERT INTO partition_leases (partition_id, owner_id, expires_at_ms) \
             VALUES (?, ?, ?) \
             ON CONFLICT(partition_id) DO UPDATE SET \
                 owner_id = CASE \
                     WHEN partition_leases.owner_id IS NULL \
                       OR partition_leases.owner_id = excluded.owner_id \
                       OR partition_leases.expires_at_ms <= ? \
                     THEN excluded.owner_id \
                     ELSE partition_leases.owner_id \
                 END, \
                 expires_at_ms = CASE \
                     WHEN partition_leases.owner_id IS NULL \
                       OR partition_leases.owner_id = excluded.owner_id \
                       OR partition_leases.expires_at_ms <= ? \
                     THEN excluded.expires_at_ms \
                     ELSE partition_leases.expires_at_ms \
                 END",
        )
        .bind(partition.get() as i64)
        .bind(owner)
        .bind(expires_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        // Verify we got the lease
        let row = sqlx::query("SELECT owner_id FROM partition_leases WHERE partition_id = ?")
            .bind(partition.get() as i64)
            .fetch_one(&self.pool)
            .await?;
        let current: Option<String> = row.try_get("owner_id")?;

        let acquired = current.as_deref() == Some(owner);
        if acquired {
            debug!(partition = %partition, owner = %owner, "Acquired lease");
        }
        Ok(acquired)
    }

    async fn renew(&self, partition: PartitionId, owner: &str, ttl: Duration) -> Result<bool> {
        let now = now_ms();
        let result = sqlx::query(
            "UPDATE partition_leases SET expires_at_ms = ? \
             WHERE partition_id = ? AND owner_id = ? AND expires_at_ms > ?",
        )
        .bind(now + ttl.as_millis() as i64)
        .bind(partition.get() as i64)
        .bind(owner)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, partition: PartitionId, owner: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE partition_leases SET owner_id = NULL \
             WHERE partition_id = ? AND owner_id = ?",
        )
        .bind(partition.get() as i64)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(partition = %partition, owner = %owner, "Released lease");
        }
        Ok(())
    }

    async fn checkpoint(
        &self,
        partition: PartitionId,
        owner: &str,
        token: &ContinuationToken,
    ) -> Result<bool> {
        let epoch = token.epoch()? as i64;

        let result = sqlx::query(
            "UPDATE partition_leases SET continuation = ?, epoch = ? \
             WHERE partition_id = ? AND owner_id = ? \
               AND (epoch IS NULL OR epoch <= ?)",
        )
        .bind(token.as_str())
        .bind(epoch)
        .bind(partition.get() as i64)
        .bind(owner)
        .bind(epoch)
        .execute(&self.pool)
        .await?;

        let accepted = result.rows_affected() > 0;
        if !accepted {
            debug!(
                partition = %partition,
                owner = %owner,
                epoch = epoch,
                "Checkpoint not accepted (stale token or lease not held)"
            );
        }
        Ok(accepted)
    }

    async fn read(&self, partition: PartitionId) -> Result<Option<Lease>> {
        let row = sqlx::query(
            "SELECT partition_id, owner_id, expires_at_ms, continuation \
             FROM partition_leases WHERE partition_id = ?",
        )
        .bind(partition.get() as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::lease_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Lease>> {
        let rows = sqlx::query(
            "SELECT partition_id, owner_id, expires_at_ms, continuation \
             FROM partition_leases ORDER BY partition_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::lease_from_row).collect()
    }
}
