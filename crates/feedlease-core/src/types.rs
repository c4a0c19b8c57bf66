//! Core data structures for partitioned change-feed consumption
//!
//! This module defines the values that flow between the lease store, the feed
//! source, and the processor:
//!
//! - **PartitionId**: which shard of the feed a value belongs to
//! - **ChangeDocument**: one raw document read from the feed
//! - **Lease**: the ownership + progress record for a partition
//! - **DeliveryContext**: the read-only per-batch metadata handed to observers
//! - **LagSample**: one point-in-time backlog estimate for a partition
//!
//! ## Design Decisions
//!
//! - `PartitionId` is a `u32` newtype derived from the lease store's opaque
//!   token form, so identifiers survive quoting/escaping differences between
//!   stores.
//! - Document payloads use `bytes::Bytes`; parsing payloads is the
//!   application's concern, not the coordinator's.
//! - `DeliveryContext` is a plain immutable value created fresh per batch.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::token::{normalize_token, ContinuationToken};

/// Identifies one shard of the change feed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PartitionId(u32);

impl PartitionId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Derive a partition id from the opaque token a lease store issues.
    ///
    /// Stores quote (and sometimes escape) the token, so it is normalized
    /// before parsing.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPartitionToken` if the normalized token is not
    /// an unsigned integer.
    pub fn from_lease_token(token: &str) -> Result<Self> {
        let normalized = normalize_token(token)?;
        normalized
            .parse::<u32>()
            .map(Self)
            .map_err(|_| Error::InvalidPartitionToken(token.to_string()))
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single raw document read from the change feed.
///
/// The payload is opaque to the coordinator; `sequence` is the feed position
/// the document was written at and `timestamp` is the feed's write time in
/// milliseconds since epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDocument {
    /// Feed sequence number of this document within its partition
    pub sequence: u64,

    /// Timestamp in milliseconds since epoch
    pub timestamp: i64,

    /// Raw payload
    pub payload: Bytes,
}

impl ChangeDocument {
    pub fn new(sequence: u64, timestamp: i64, payload: Bytes) -> Self {
        Self {
            sequence,
            timestamp,
            payload,
        }
    }
}

/// Ownership + progress record for one partition.
///
/// A lease is held by at most one owner while unexpired. The continuation
/// token survives releases and takeovers: the next owner always resumes from
/// the last accepted checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Partition this lease covers
    pub partition_id: PartitionId,

    /// Current owner, `None` when released
    pub owner_id: Option<String>,

    /// Absolute expiry in milliseconds since epoch
    pub expires_at_ms: i64,

    /// Last accepted checkpoint, `None` if never checkpointed
    pub continuation: Option<ContinuationToken>,
}

impl Lease {
    /// Whether this lease has expired as of `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Whether `owner` holds this lease unexpired as of `now_ms`.
    pub fn is_held_by(&self, owner: &str, now_ms: i64) -> bool {
        !self.is_expired(now_ms) && self.owner_id.as_deref() == Some(owner)
    }
}

/// Immutable per-batch metadata handed to the observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryContext {
    /// Name of the feed source this batch came from
    pub source_name: String,

    /// Consumer group the processor runs under
    pub group_name: String,

    /// Continuation epoch effective at the start of this batch
    pub epoch: u64,

    /// Timestamp of the newest document in the batch (ms since epoch)
    pub newest_timestamp: i64,

    /// Partition the batch was read from
    pub partition_id: PartitionId,

    /// Cost charged by the source for the read
    pub request_charge: f64,
}

/// Point-in-time backlog estimate for one partition. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagSample {
    /// Partition the estimate covers
    pub partition_id: PartitionId,

    /// Estimated number of unread documents remaining
    pub backlog: u64,
}
