//! Feedlease Core - Shared Data Model
//!
//! This crate defines the types shared by every Feedlease component: partition
//! identifiers, continuation tokens, change documents, lease records, delivery
//! contexts, lag samples, and owner identity.
//!
//! ## The Model
//!
//! A change feed is an ordered, append-only stream of change documents, split
//! into partitions. Progress through a partition is tracked by a
//! **continuation token** - an opaque-but-ordered marker that advances only
//! when a consumer explicitly checkpoints a delivered batch. Ownership of a
//! partition is claimed through a **lease**: a time-bounded record naming the
//! current owner and holding the last accepted continuation token.
//!
//! ```text
//! ┌───────────────┐   fetch(token)    ┌─────────────────┐
//! │  Feed Source  │ ────────────────→ │    Processor    │
//! │  (partitioned)│ ←──────────────── │  (per process)  │
//! └───────────────┘   docs + token'   └────────┬────────┘
//!                                              │ checkpoint(token')
//!                                              ▼
//!                                     ┌─────────────────┐
//!                                     │   Lease Store   │
//!                                     │ {owner, expiry, │
//!                                     │  continuation}  │
//!                                     └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use feedlease_core::{ContinuationToken, PartitionId};
//!
//! // Lease tokens arrive quoted; identifiers are normalized before use.
//! let partition = PartitionId::from_lease_token("\"42\"").unwrap();
//! assert_eq!(partition.get(), 42);
//!
//! let token = ContinuationToken::new("\"1203\"");
//! assert_eq!(token.epoch().unwrap(), 1203);
//! ```

pub mod error;
pub mod owner;
pub mod token;
pub mod types;

pub use error::{Error, Result};
pub use owner::OwnerId;
pub use token::ContinuationToken;
pub use types::{ChangeDocument, DeliveryContext, LagSample, Lease, PartitionId};

/// Get current timestamp in milliseconds since epoch
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("System time before UNIX epoch")
        .as_millis() as i64
}
