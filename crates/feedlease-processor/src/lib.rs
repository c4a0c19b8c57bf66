//! Feedlease Processor - Partitioned Change-Feed Consumption
//!
//! This crate coordinates distributed, partitioned consumption of an ordered,
//! append-only change feed: it acquires and renews exclusive leases over feed
//! partitions across a fleet of competing consumer processes, pulls batches
//! per owned partition, and hands them to an application-supplied observer
//! with a deferred-checkpoint contract.
//!
//! ## Architecture
//!
//! ```text
//!                ┌────────────────────────────────────────────┐
//!                │               FeedProcessor                │
//!                │  ┌──────────────┐   reconcile every 1s     │
//!                │  │ReconcileTask │──── acquire / renew ─────┼──→ LeaseStore
//!                │  └──────┬───────┘                          │    (conditional
//!                │         │ spawn per owned partition        │     writes)
//!                │  ┌──────▼────────────┐                     │
//!                │  │PartitionProcessor │── fetch_next ───────┼──→ FeedSource
//!                │  │  (one per lease)  │── ingest(ctx, cp) ──┼──→ Observer
//!                │  └───────────────────┘                     │
//!                │  ┌───────────────┐                         │
//!                │  │  LagMonitor   │── estimate_backlog ─────┼──→ FeedSource
//!                │  └───────────────┘   (optional, isolated)  │
//!                └────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery Contract
//!
//! - **At-least-once**: a batch is only marked processed when the observer
//!   invokes its [`Checkpoint`]; anything else (crash, rebalance, observer
//!   error) leads to redelivery of the same or overlapping data.
//! - **Per-partition order**: batches follow the feed's continuation order
//!   within a partition; nothing is guaranteed across partitions.
//! - **Monotonic checkpoints**: a stale (older) checkpoint after a newer one
//!   is a silent no-op - the high-water mark only moves forward.
//!
//! ## Example
//!
//! ```ignore
//! use feedlease_processor::{FeedProcessor, LagMonitor};
//!
//! let processor = FeedProcessor::builder()
//!     .source(feed.clone())
//!     .store(leases)
//!     .observer(handler)
//!     .group_name("projections")
//!     .build()?;
//! processor.start().await?;
//!
//! // Optional backlog telemetry alongside consumption:
//! tokio::spawn(LagMonitor::new(feed).run(
//!     |samples| async move { report(samples).await },
//!     processor.shutdown_token(),
//! ));
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod hooks;
pub mod lag;
pub mod observer;
pub mod partition;
pub mod processor;

pub use checkpoint::Checkpoint;
pub use config::ProcessorConfig;
pub use error::{ProcessorError, Result};
pub use hooks::{Hooks, TracingHooks};
pub use lag::LagMonitor;
pub use observer::Observer;
pub use partition::PartitionState;
pub use processor::{FeedProcessor, FeedProcessorBuilder};
