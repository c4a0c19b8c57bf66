//! In-memory lease store
//!
//! Backs tests and embedded single-process deployments. The conditional-write
//! semantics are identical to [`SqliteLeaseStore`](crate::SqliteLeaseStore):
//! tests that simulate competing consumer processes against this store
//! exercise the same acquire/renew/checkpoint races the persistent backend
//! arbitrates.
//!
//! ## Limitations
//!
//! - **Single-process only**: ownership is not visible across process
//!   boundaries
//! - **No persistence**: all state is lost when the process exits

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use feedlease_core::{now_ms, ContinuationToken, Lease, PartitionId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::LeaseStore;

#[derive(Debug, Clone)]
struct LeaseRow {
    owner_id: Option<String>,
    expires_at_ms: i64,
    continuation: Option<ContinuationToken>,
    epoch: Option<u64>,
}

/// In-memory [`LeaseStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    rows: RwLock<HashMap<PartitionId, LeaseRow>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn try_acquire(
        &self,
        partition: PartitionId,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let now = now_ms();
        let mut rows = self.rows.write().await;
        let row = rows.entry(partition).or_insert_with(|| LeaseRow {
            owner_id: None,
            expires_at_ms: now,
            continuation: None,
            epoch: None,
        });

        let free = match &row.owner_id {
            None => true,
            Some(current) => current == owner || now >= row.expires_at_ms,
        };
        if !free {
            return Ok(false);
        }

        row.owner_id = Some(owner.to_string());
        row.expires_at_ms = now + ttl.as_millis() as i64;
        debug!(partition = %partition, owner = %owner, "Acquired lease");
        Ok(true)
    }

    async fn renew(&self, partition: PartitionId, owner: &str, ttl: Duration) -> Result<bool> {
        let now = now_ms();
        let mut rows = self.rows.write().await;
        match rows.get_mut(&partition) {
            Some(row)
                if row.owner_id.as_deref() == Some(owner) && now < row.expires_at_ms =>
            {
                row.expires_at_ms = now + ttl.as_millis() as i64;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, partition: PartitionId, owner: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(&partition) {
            if row.owner_id.as_deref() == Some(owner) {
                row.owner_id = None;
                debug!(partition = %partition, owner = %owner, "Released lease");
            }
        }
        Ok(())
    }

    async fn checkpoint(
        &self,
        partition: PartitionId,
        owner: &str,
        token: &ContinuationToken,
    ) -> Result<bool> {
        let epoch = token.epoch()?;
        let mut rows = self.rows.write().await;
        let row = match rows.get_mut(&partition) {
            Some(row) if row.owner_id.as_deref() == Some(owner) => row,
            _ => return Ok(false),
        };

        if let Some(stored) = row.epoch {
            if epoch < stored {
                debug!(
                    partition = %partition,
                    stale = epoch,
                    stored = stored,
                    "Ignoring stale checkpoint"
                );
                return Ok(false);
            }
        }

        row.continuation = Some(token.clone());
        row.epoch = Some(epoch);
        Ok(true)
    }

    async fn read(&self, partition: PartitionId) -> Result<Option<Lease>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&partition).map(|row| Lease {
            partition_id: partition,
            owner_id: row.owner_id.clone(),
            expires_at_ms: row.expires_at_ms,
            continuation: row.continuation.clone(),
        }))
    }

    async fn list(&self) -> Result<Vec<Lease>> {
        let rows = self.rows.read().await;
        let mut leases: Vec<Lease> = rows
            .iter()
            .map(|(partition, row)| Lease {
                partition_id: *partition,
                owner_id: row.owner_id.clone(),
                expires_at_ms: row.expires_at_ms,
                continuation: row.continuation.clone(),
            })
            .collect();
        leases.sort_by_key(|l| l.partition_id);
        Ok(leases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_acquire_fresh_partition() {
        let store = MemoryLeaseStore::new();
        assert!(store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap());

        let lease = store.read(PartitionId::new(0)).await.unwrap().unwrap();
        assert_eq!(lease.owner_id.as_deref(), Some("a"));
        assert!(lease.continuation.is_none());
    }

    #[tokio::test]
    async fn test_acquire_contested_partition_fails() {
        let store = MemoryLeaseStore::new();
        assert!(store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap());
        assert!(!store
            .try_acquire(PartitionId::new(0), "b", TTL)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_acquire_is_reentrant_for_owner() {
        let store = MemoryLeaseStore::new();
        assert!(store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap());
        assert!(store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let store = MemoryLeaseStore::new();
        assert!(store
            .try_acquire(PartitionId::new(0), "a", Duration::from_millis(20))
            .await
            .unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store
            .try_acquire(PartitionId::new(0), "b", TTL)
            .await
            .unwrap());
        let lease = store.read(PartitionId::new(0)).await.unwrap().unwrap();
        assert_eq!(lease.owner_id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_renew_extends_held_lease() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap();
        assert!(store.renew(PartitionId::new(0), "a", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_fails_for_non_owner() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap();
        assert!(!store.renew(PartitionId::new(0), "b", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_fails_after_expiry() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!store.renew(PartitionId::new(0), "a", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_preserves_continuation() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap();
        store
            .checkpoint(PartitionId::new(0), "a", &ContinuationToken::from(5u64))
            .await
            .unwrap();
        store.release(PartitionId::new(0), "a").await.unwrap();

        let lease = store.read(PartitionId::new(0)).await.unwrap().unwrap();
        assert!(lease.owner_id.is_none());
        assert_eq!(lease.continuation, Some(ContinuationToken::from(5u64)));
    }

    #[tokio::test]
    async fn test_release_by_non_owner_is_noop() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap();
        store.release(PartitionId::new(0), "b").await.unwrap();

        let lease = store.read(PartitionId::new(0)).await.unwrap().unwrap();
        assert_eq!(lease.owner_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_checkpoint_advances_token() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap();

        assert!(store
            .checkpoint(PartitionId::new(0), "a", &ContinuationToken::from(3u64))
            .await
            .unwrap());
        assert!(store
            .checkpoint(PartitionId::new(0), "a", &ContinuationToken::from(7u64))
            .await
            .unwrap());

        let lease = store.read(PartitionId::new(0)).await.unwrap().unwrap();
        assert_eq!(lease.continuation, Some(ContinuationToken::from(7u64)));
    }

    #[tokio::test]
    async fn test_stale_checkpoint_is_silent_noop() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap();

        store
            .checkpoint(PartitionId::new(0), "a", &ContinuationToken::from(7u64))
            .await
            .unwrap();
        // Older token after a newer one: ignored, not an error.
        assert!(!store
            .checkpoint(PartitionId::new(0), "a", &ContinuationToken::from(3u64))
            .await
            .unwrap());

        let lease = store.read(PartitionId::new(0)).await.unwrap().unwrap();
        assert_eq!(lease.continuation, Some(ContinuationToken::from(7u64)));
    }

    #[tokio::test]
    async fn test_equal_checkpoint_is_accepted() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap();
        store
            .checkpoint(PartitionId::new(0), "a", &ContinuationToken::from(7u64))
            .await
            .unwrap();
        assert!(store
            .checkpoint(PartitionId::new(0), "a", &ContinuationToken::from(7u64))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_checkpoint_by_non_owner_rejected() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap();
        assert!(!store
            .checkpoint(PartitionId::new(0), "b", &ContinuationToken::from(3u64))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_checkpoint_with_garbage_token_errors() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap();
        let result = store
            .checkpoint(PartitionId::new(0), "a", &ContinuationToken::new("oops"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_quoted_tokens_compare_by_epoch() {
        let store = MemoryLeaseStore::new();
        store
            .try_acquire(PartitionId::new(0), "a", TTL)
            .await
            .unwrap();
        assert!(store
            .checkpoint(PartitionId::new(0), "a", &ContinuationToken::new("\"9\""))
            .await
            .unwrap());
        assert!(!store
            .checkpoint(PartitionId::new(0), "a", &ContinuationToken::new("\"8\""))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_sorted_by_partition() {
        let store = MemoryLeaseStore::new();
        for id in [5u32, 1, 3] {
            store
                .try_acquire(PartitionId::new(id), "a", TTL)
                .await
                .unwrap();
        }
        let leases = store.list().await.unwrap();
        let ids: Vec<u32> = leases.iter().map(|l| l.partition_id.get()).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_read_unknown_partition() {
        let store = MemoryLeaseStore::new();
        assert!(store.read(PartitionId::new(42)).await.unwrap().is_none());
    }
}
