//! Feedlease Feed Source
//!
//! This crate defines the [`FeedSource`] trait - the coordinator's view of
//! the remote change feed - plus [`MemoryFeed`], an in-memory implementation
//! for testing and embedding.
//!
//! ## The Contract
//!
//! A feed source exposes an ordered, append-only stream of change documents
//! per partition. Reading is cursor-based: every fetch takes the last
//! continuation token and returns the next batch together with a new token.
//! The source also reports an estimated backlog per partition for the lag
//! monitor.
//!
//! ```text
//! fetch_next(partition, token, max)
//!        │
//!        ▼
//! ┌────────────────────────────────────────────┐
//! │ partition 0:  [d0][d1][d2][d3][d4][d5] ... │
//! │                        ▲         ▲         │
//! │                      token     token'      │
//! └────────────────────────────────────────────┘
//! ```
//!
//! The coordinator never interprets tokens beyond their ordered epoch; the
//! source owns their shape.

pub mod error;
pub mod memory;

pub use error::{Error, Result};
pub use memory::MemoryFeed;

use async_trait::async_trait;
use feedlease_core::{ChangeDocument, ContinuationToken, LagSample, PartitionId};

/// One batch read from the feed.
#[derive(Debug, Clone)]
pub struct FeedPage {
    /// Documents in feed order; may be empty when the reader is at the tail
    pub documents: Vec<ChangeDocument>,

    /// Token to resume from after this page
    pub continuation: ContinuationToken,

    /// Cost charged by the source for this read
    pub request_charge: f64,
}

impl FeedPage {
    /// Timestamp of the newest document in the page, or `None` when empty.
    pub fn newest_timestamp(&self) -> Option<i64> {
        self.documents.iter().map(|d| d.timestamp).max()
    }
}

/// Opaque source exposing "read next batch for partition since token".
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the next batch for `partition` after `since`.
    ///
    /// `since = None` reads from the beginning of the partition's retained
    /// feed. An empty page still carries a valid continuation token.
    async fn fetch_next(
        &self,
        partition: PartitionId,
        since: Option<&ContinuationToken>,
        max_items: Option<usize>,
    ) -> Result<FeedPage>;

    /// The current tail position of `partition` (used for start-from-tail
    /// positioning).
    async fn latest_token(&self, partition: PartitionId) -> Result<ContinuationToken>;

    /// Partitions currently known to the source.
    async fn partitions(&self) -> Result<Vec<PartitionId>>;

    /// Estimated unread backlog per known partition.
    async fn estimate_backlog(&self) -> Result<Vec<LagSample>>;
}
