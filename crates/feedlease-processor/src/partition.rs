//! Partition Processor
//!
//! One processor instance runs per currently-owned partition, driving the
//! state machine:
//!
//! ```text
//! Idle → Fetching → Delivering → (Idle | Faulted)
//! ```
//!
//! - **Fetching**: pull the next batch from the feed source at the last
//!   accepted continuation (or the configured start position)
//! - **Delivering**: hand the batch to the observer together with a
//!   [`Checkpoint`](crate::Checkpoint) bound to the batch's new token
//! - **Idle**: nothing new in the partition; wait `feed_poll_delay`
//! - **Faulted**: the observer raised - abandon the lease without a
//!   checkpoint and stop
//!
//! Transient source errors are retried after the poll delay; observer errors
//! are fatal to this lease tenure (retry policy belongs to the observer).

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use feedlease_core::{ContinuationToken, DeliveryContext, PartitionId};
use feedlease_source::FeedSource;
use feedlease_store::LeaseStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::checkpoint::Checkpoint;
use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::hooks::Hooks;
use crate::observer::Observer;

/// Per-partition delivery states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionState {
    /// Waiting before the next fetch
    Idle,
    /// Requesting the next batch from the source
    Fetching,
    /// Observer is handling a batch
    Delivering,
    /// Observer raised; lease abandoned
    Faulted,
}

pub(crate) struct PartitionProcessor {
    pub(crate) partition: PartitionId,
    pub(crate) config: Arc<ProcessorConfig>,
    pub(crate) store: Arc<dyn LeaseStore>,
    pub(crate) source: Arc<dyn FeedSource>,
    pub(crate) observer: Arc<dyn Observer>,
    pub(crate) hooks: Arc<dyn Hooks>,
    pub(crate) cancel: CancellationToken,
}

impl PartitionProcessor {
    /// Drive the partition until cancelled or faulted.
    pub(crate) async fn run(self, initial: Option<ContinuationToken>) {
        let initial_epoch = match &initial {
            Some(token) => match token.epoch() {
                Ok(epoch) => epoch,
                Err(e) => {
                    self.fault(ProcessorError::Continuation(e)).await;
                    return;
                }
            },
            None => 0,
        };

        info!(
            partition = %self.partition,
            owner = %self.config.owner,
            epoch = initial_epoch,
            "Partition processor started"
        );

        let high_water = Arc::new(AtomicU64::new(initial_epoch));
        let mut token = initial;
        let mut epoch = initial_epoch;

        while !self.cancel.is_cancelled() {
            trace!(
                partition = %self.partition,
                state = ?PartitionState::Fetching,
                epoch = epoch,
                "Fetching next batch"
            );
            let page = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.source.fetch_next(
                    self.partition,
                    token.as_ref(),
                    self.config.max_items,
                ) => result,
            };

            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        partition = %self.partition,
                        error = %e,
                        "Fetch failed; retrying after poll delay"
                    );
                    if self.pause(self.config.feed_poll_delay).await {
                        break;
                    }
                    continue;
                }
            };

            if page.documents.is_empty() {
                debug!(
                    partition = %self.partition,
                    state = ?PartitionState::Idle,
                    "Feed at tail; waiting for new documents"
                );
                token = Some(page.continuation);
                if self.pause(self.config.feed_poll_delay).await {
                    break;
                }
                continue;
            }

            let next_epoch = match page.continuation.epoch() {
                Ok(next) => next,
                Err(e) => {
                    // A token we cannot order would corrupt the monotonic
                    // checkpoint invariant: surface instead of guessing.
                    self.fault(ProcessorError::Continuation(e)).await;
                    return;
                }
            };

            debug!(
                partition = %self.partition,
                state = ?PartitionState::Delivering,
                documents = page.documents.len(),
                epoch = epoch,
                next_epoch = next_epoch,
                "Delivering batch"
            );

            let context = DeliveryContext {
                source_name: self.config.source_name.clone(),
                group_name: self.config.group_name.clone(),
                epoch,
                newest_timestamp: page.newest_timestamp().unwrap_or_default(),
                partition_id: self.partition,
                request_charge: page.request_charge,
            };
            let checkpoint = Checkpoint::new(
                Arc::clone(&self.store),
                self.partition,
                self.config.owner.clone(),
                page.continuation.clone(),
                next_epoch,
                Arc::clone(&high_water),
            );

            match self
                .observer
                .ingest(context, checkpoint, page.documents)
                .await
            {
                Ok(()) => {
                    token = Some(page.continuation);
                    epoch = next_epoch;
                }
                Err(e) => {
                    self.fault(ProcessorError::Observer(e)).await;
                    return;
                }
            }
        }

        debug!(partition = %self.partition, "Partition processor stopped");
    }

    /// Wait out a delay; returns `true` when cancelled.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }

    /// Fatal exit: notify, abandon the lease without a checkpoint.
    async fn fault(&self, error: ProcessorError) {
        error!(
            partition = %self.partition,
            owner = %self.config.owner,
            state = ?PartitionState::Faulted,
            error = %error,
            "Partition processor faulted; abandoning lease"
        );
        self.hooks.on_error(self.partition, &error);

        if let Err(e) = self
            .store
            .release(self.partition, self.config.owner.as_str())
            .await
        {
            warn!(
                partition = %self.partition,
                error = %e,
                "Failed to release lease after fault"
            );
        }
    }
}
