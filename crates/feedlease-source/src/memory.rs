//! In-memory change feed
//!
//! An append-only, partitioned feed held in process memory. Continuation
//! tokens are document counts: token `"3"` means "the first three documents
//! of this partition have been read". Fetches never block - an empty page
//! with the unchanged token means the reader is at the tail.
//!
//! The feed tracks the furthest position any reader has fetched per
//! partition, which backs [`estimate_backlog`](crate::FeedSource::estimate_backlog).
//!
//! ## Usage
//!
//! ```ignore
//! use feedlease_source::{FeedSource, MemoryFeed};
//! use feedlease_core::PartitionId;
//!
//! let feed = MemoryFeed::new();
//! feed.create_partition(PartitionId::new(0)).await;
//! feed.push(PartitionId::new(0), "{\"id\":1}").await;
//!
//! let page = feed.fetch_next(PartitionId::new(0), None, None).await?;
//! assert_eq!(page.documents.len(), 1);
//! assert_eq!(page.continuation.epoch()?, 1);
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use feedlease_core::{now_ms, ChangeDocument, ContinuationToken, LagSample, PartitionId};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::{FeedPage, FeedSource};

/// Largest batch the feed hands out in one fetch, regardless of the
/// caller's `max_items`.
const MAX_BATCH: usize = 512;

/// Base cost charged per read request.
const BASE_REQUEST_CHARGE: f64 = 1.0;

/// Additional cost charged per returned document.
const PER_DOCUMENT_CHARGE: f64 = 0.25;

#[derive(Debug, Default)]
struct PartitionLog {
    documents: Vec<ChangeDocument>,
    /// Furthest position any reader has fetched.
    delivered: u64,
}

/// In-memory [`FeedSource`] implementation.
#[derive(Debug, Default)]
pub struct MemoryFeed {
    partitions: RwLock<HashMap<PartitionId, PartitionLog>>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an (initially empty) partition.
    pub async fn create_partition(&self, partition: PartitionId) {
        let mut partitions = self.partitions.write().await;
        partitions.entry(partition).or_default();
    }

    /// Append one document to a partition, creating the partition if needed.
    ///
    /// Returns the sequence number the document was written at.
    pub async fn push(&self, partition: PartitionId, payload: impl Into<Bytes>) -> u64 {
        let mut partitions = self.partitions.write().await;
        let log = partitions.entry(partition).or_default();
        let sequence = log.documents.len() as u64;
        log.documents
            .push(ChangeDocument::new(sequence, now_ms(), payload.into()));
        sequence
    }

    /// Number of documents currently retained for a partition.
    pub async fn len(&self, partition: PartitionId) -> usize {
        let partitions = self.partitions.read().await;
        partitions
            .get(&partition)
            .map(|log| log.documents.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl FeedSource for MemoryFeed {
    async fn fetch_next(
        &self,
        partition: PartitionId,
        since: Option<&ContinuationToken>,
        max_items: Option<usize>,
    ) -> Result<FeedPage> {
        let start = match since {
            Some(token) => token.epoch()? as usize,
            None => 0,
        };

        let mut partitions = self.partitions.write().await;
        let log = partitions
            .get_mut(&partition)
            .ok_or(Error::UnknownPartition(partition))?;

        let start = start.min(log.documents.len());
        let limit = max_items.unwrap_or(MAX_BATCH).min(MAX_BATCH);
        let end = (start + limit).min(log.documents.len());

        let documents: Vec<ChangeDocument> = log.documents[start..end].to_vec();
        log.delivered = log.delivered.max(end as u64);

        Ok(FeedPage {
            request_charge: BASE_REQUEST_CHARGE + documents.len() as f64 * PER_DOCUMENT_CHARGE,
            continuation: ContinuationToken::from(end as u64),
            documents,
        })
    }

    async fn latest_token(&self, partition: PartitionId) -> Result<ContinuationToken> {
        let partitions = self.partitions.read().await;
        let log = partitions
            .get(&partition)
            .ok_or(Error::UnknownPartition(partition))?;
        Ok(ContinuationToken::from(log.documents.len() as u64))
    }

    async fn partitions(&self) -> Result<Vec<PartitionId>> {
        let partitions = self.partitions.read().await;
        let mut ids: Vec<PartitionId> = partitions.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn estimate_backlog(&self) -> Result<Vec<LagSample>> {
        let partitions = self.partitions.read().await;
        let mut samples: Vec<LagSample> = partitions
            .iter()
            .map(|(partition, log)| LagSample {
                partition_id: *partition,
                backlog: log.documents.len() as u64 - log.delivered,
            })
            .collect();
        samples.sort_by_key(|s| s.partition_id);
        Ok(samples)
    }
}
