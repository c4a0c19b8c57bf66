//! Observer Contract
//!
//! The observer is the application's side of the delivery loop: it receives
//! each batch together with a [`Checkpoint`] action and decides *when* - or
//! whether - progress becomes durable.
//!
//! ## The Contract
//!
//! - Delivery is **at-least-once**. After any fault or rebalance, the same or
//!   overlapping batches may be presented again; the coordinator offers no
//!   deduplication.
//! - The checkpoint action may be invoked at any point: immediately, after
//!   downstream persistence, from a spawned task, even after `ingest`
//!   returned. Not invoking it means the batch is never marked processed.
//! - Batches from *different* partitions may arrive concurrently; no global
//!   order exists across partitions.
//! - Returning an error is fatal for the partition's current lease tenure:
//!   the lease is abandoned without a checkpoint and a fresh owner resumes
//!   from the last accepted one. Retry policy, if desired, belongs inside
//!   the observer.
//!
//! ## Example
//!
//! ```ignore
//! use async_trait::async_trait;
//! use feedlease_core::{ChangeDocument, DeliveryContext};
//! use feedlease_processor::{Checkpoint, Observer};
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl Observer for Printer {
//!     async fn ingest(
//!         &self,
//!         context: DeliveryContext,
//!         checkpoint: Checkpoint,
//!         documents: Vec<ChangeDocument>,
//!     ) -> anyhow::Result<()> {
//!         for doc in &documents {
//!             println!("partition {}: {} bytes", context.partition_id, doc.payload.len());
//!         }
//!         checkpoint.commit().await?;
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use feedlease_core::{ChangeDocument, DeliveryContext};

use crate::checkpoint::Checkpoint;

/// Application-supplied handler invoked once per delivered batch.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn ingest(
        &self,
        context: DeliveryContext,
        checkpoint: Checkpoint,
        documents: Vec<ChangeDocument>,
    ) -> anyhow::Result<()>;
}
