//! Deferred Checkpoint Action
//!
//! A [`Checkpoint`] is constructed per batch and handed to the observer,
//! which invokes it whenever its own notion of durability is satisfied -
//! inline, after downstream persistence, or from a spawned task long after
//! `ingest` returned.
//!
//! ## Guarantees
//!
//! - **One-shot**: the first `commit` does the work; later calls on the same
//!   handle (or its clones) return `Ok` without touching the store.
//! - **Monotonic**: an in-process high-water mark shared by all batches of a
//!   partition short-circuits commits that arrive out of order, and the
//!   lease store enforces the same invariant under its conditional write. A
//!   stale (older) token is silently ignored - never an error.
//! - **Late invocation honored**: committing after the next batch has
//!   already started still advances the high-water mark if the token is the
//!   newest seen.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use feedlease_core::{ContinuationToken, OwnerId, PartitionId};
use feedlease_store::LeaseStore;
use tracing::debug;

use crate::error::Result;

/// One-shot deferred action persisting a batch's continuation token.
///
/// Cheap to clone; clones share the one-shot state.
#[derive(Clone)]
pub struct Checkpoint {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn LeaseStore>,
    partition: PartitionId,
    owner: OwnerId,
    token: ContinuationToken,
    epoch: u64,
    /// Highest epoch committed for this partition by this processor.
    high_water: Arc<AtomicU64>,
    committed: AtomicBool,
}

impl Checkpoint {
    pub(crate) fn new(
        store: Arc<dyn LeaseStore>,
        partition: PartitionId,
        owner: OwnerId,
        token: ContinuationToken,
        epoch: u64,
        high_water: Arc<AtomicU64>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                partition,
                owner,
                token,
                epoch,
                high_water,
                committed: AtomicBool::new(false),
            }),
        }
    }

    /// The token this action will persist.
    pub fn token(&self) -> &ContinuationToken {
        &self.inner.token
    }

    /// The ordered position behind the token.
    pub fn epoch(&self) -> u64 {
        self.inner.epoch
    }

    /// Persist the batch's continuation token into the lease record.
    ///
    /// Idempotent: repeat calls are a no-op. A commit that is stale relative
    /// to the partition's high-water mark is silently skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only when the lease store itself fails; losing the
    /// lease in the meantime is not an error (the write is simply not
    /// accepted).
    pub async fn commit(&self) -> Result<()> {
        if self.inner.committed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let previous = self
            .inner
            .high_water
            .fetch_max(self.inner.epoch, Ordering::SeqCst);
        if previous >= self.inner.epoch {
            debug!(
                partition = %self.inner.partition,
                epoch = self.inner.epoch,
                high_water = previous,
                "Skipping stale checkpoint"
            );
            return Ok(());
        }

        let accepted = self
            .inner
            .store
            .checkpoint(
                self.inner.partition,
                self.inner.owner.as_str(),
                &self.inner.token,
            )
            .await?;

        if accepted {
            debug!(
                partition = %self.inner.partition,
                epoch = self.inner.epoch,
                "Checkpoint accepted"
            );
        } else {
            debug!(
                partition = %self.inner.partition,
                epoch = self.inner.epoch,
                "Checkpoint not accepted (stale token or lease not held)"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpoint")
            .field("partition", &self.inner.partition)
            .field("epoch", &self.inner.epoch)
            .field("committed", &self.inner.committed.load(Ordering::SeqCst))
            .finish()
    }
}
