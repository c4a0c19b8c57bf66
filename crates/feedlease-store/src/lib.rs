//! Feedlease Lease Store
//!
//! This crate defines the [`LeaseStore`] trait - the single source of truth
//! for partition ownership - together with two backends:
//!
//! - [`SqliteLeaseStore`]: persistent, single-node deployments
//! - [`MemoryLeaseStore`]: testing and embedded use
//!
//! ## Why Conditional Writes?
//!
//! Multiple consumer processes race for the same partitions. The store is the
//! arbiter: every mutation is conditional (acquire only if free/expired,
//! renew only if still held, checkpoint only if still held and the token
//! advances), so losers of a race simply observe `false` and move on. The
//! coordinator never assumes in-process locking suffices across processes.
//!
//! ## Lease Record
//!
//! ```text
//! partition_leases
//! ┌──────────────┬──────────┬───────────────┬──────────────┬───────┐
//! │ partition_id │ owner_id │ expires_at_ms │ continuation │ epoch │
//! └──────────────┴──────────┴───────────────┴──────────────┴───────┘
//! ```
//!
//! The continuation token survives release and takeover: a fresh owner always
//! resumes from the last accepted checkpoint.
//!
//! ## Example
//!
//! ```ignore
//! use feedlease_store::{LeaseStore, SqliteLeaseStore};
//! use feedlease_core::PartitionId;
//! use std::time::Duration;
//!
//! let store = SqliteLeaseStore::new("leases.db").await?;
//! let got = store
//!     .try_acquire(PartitionId::new(0), "host/app/123", Duration::from_secs(10))
//!     .await?;
//! if got {
//!     // ... process partition 0, renew before the TTL elapses ...
//! }
//! ```

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::{Error, Result};
pub use memory::MemoryLeaseStore;
pub use sqlite::SqliteLeaseStore;

use std::time::Duration;

use async_trait::async_trait;
use feedlease_core::{ContinuationToken, Lease, PartitionId};

/// Keyed store holding one lease record per partition.
///
/// All mutations are conditional; conflicts are reported as `false`, never as
/// errors. Implementations must be safe to share across processes (or, for
/// [`MemoryLeaseStore`], across tasks standing in for processes in tests).
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Claim the partition for `owner` with the given TTL.
    ///
    /// Succeeds iff the lease is absent, released, expired, or already held
    /// by `owner`. Refreshes the expiry on success.
    async fn try_acquire(
        &self,
        partition: PartitionId,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool>;

    /// Extend the lease for `owner`.
    ///
    /// Succeeds iff `owner` currently holds the lease unexpired. An expired
    /// lease cannot be renewed - it must be re-acquired.
    async fn renew(&self, partition: PartitionId, owner: &str, ttl: Duration) -> Result<bool>;

    /// Give up ownership while preserving the checkpointed continuation.
    ///
    /// Releasing a lease that is not held by `owner` is a no-op.
    async fn release(&self, partition: PartitionId, owner: &str) -> Result<()>;

    /// Persist `token` as the partition's new resume point.
    ///
    /// Accepted iff `owner` holds the lease record and the token's epoch is
    /// not lower than the stored one. A stale (older) token is a no-op
    /// returning `false` - the high-water mark only moves forward.
    async fn checkpoint(
        &self,
        partition: PartitionId,
        owner: &str,
        token: &ContinuationToken,
    ) -> Result<bool>;

    /// Read one lease record.
    async fn read(&self, partition: PartitionId) -> Result<Option<Lease>>;

    /// All lease records, sorted by partition id.
    async fn list(&self) -> Result<Vec<Lease>>;
}
