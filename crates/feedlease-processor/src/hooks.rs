//! Notification Hooks
//!
//! Operators observe the coordinator through three events: a partition was
//! assigned to this process, a partition was revoked (lease lost, released,
//! or the processor faulted), and a per-partition error occurred. The default
//! implementation logs each event; deployments that feed dashboards or
//! alerting replace it.
//!
//! Hook methods are called from the coordinator's own tasks - keep them
//! cheap and non-blocking.

use feedlease_core::PartitionId;
use tracing::{error, info};

use crate::error::ProcessorError;

/// Receives partition lifecycle notifications from the coordinator.
pub trait Hooks: Send + Sync {
    /// This process now owns `partition` and will start delivering from it.
    fn on_assigned(&self, _partition: PartitionId) {}

    /// This process no longer owns `partition`; unflushed progress for it is
    /// discarded.
    fn on_revoked(&self, _partition: PartitionId) {}

    /// Delivery for `partition` failed; its lease is being abandoned.
    fn on_error(&self, _partition: PartitionId, _error: &ProcessorError) {}
}

/// Default hooks: structured log lines, nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHooks;

impl Hooks for TracingHooks {
    fn on_assigned(&self, partition: PartitionId) {
        info!(partition = %partition, "Partition assigned");
    }

    fn on_revoked(&self, partition: PartitionId) {
        info!(partition = %partition, "Partition revoked");
    }

    fn on_error(&self, partition: PartitionId, error: &ProcessorError) {
        error!(partition = %partition, error = %error, "Partition processing failed");
    }
}
