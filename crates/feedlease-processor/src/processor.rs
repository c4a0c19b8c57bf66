//! Feed Processor - Lease Coordination and Lifecycle
//!
//! The [`FeedProcessor`] is the per-process coordinator. It owns the set of
//! partitions this process is actively consuming and reconciles that set
//! against the lease store on a fixed cadence:
//!
//! 1. **Sweep**: drop entries whose partition processor has exited
//! 2. **Renew**: extend held leases before their TTL elapses; a failed
//!    renewal means the partition was lost and its processor is stopped
//! 3. **Acquire**: scan for free or expired leases and race for them; a won
//!    race spawns a partition processor resuming from the last accepted
//!    checkpoint
//!
//! Races are resolved entirely by the lease store's conditional writes -
//! losing one is not an error, just "not ours this cycle". Transient store
//! and source failures are logged and retried on the next cycle.
//!
//! ## Lifecycle
//!
//! 1. **Build**: configure via `FeedProcessor::builder()`
//! 2. **Start**: spawn the reconcile loop
//! 3. **Run**: partitions are assigned/revoked as leases move between
//!    competing processes
//! 4. **Stop**: cancel all tasks and release held leases (or cancel the
//!    shared token and let leases expire naturally)
//!
//! ## Example
//!
//! ```ignore
//! use feedlease_processor::FeedProcessor;
//!
//! let processor = FeedProcessor::builder()
//!     .source(feed)
//!     .store(leases)
//!     .observer(handler)
//!     .group_name("analytics")
//!     .build()?;
//!
//! processor.start().await?;
//! // ... consume until shutdown ...
//! processor.stop().await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use feedlease_core::{now_ms, ContinuationToken, OwnerId, PartitionId};
use feedlease_source::FeedSource;
use feedlease_store::LeaseStore;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProcessorConfig;
use crate::error::{ProcessorError, Result};
use crate::hooks::{Hooks, TracingHooks};
use crate::observer::Observer;
use crate::partition::PartitionProcessor;

/// Book-keeping for one partition this process currently owns.
struct OwnedPartition {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
    last_renewed: Instant,
}

/// Per-process change-feed consumption coordinator.
pub struct FeedProcessor {
    config: Arc<ProcessorConfig>,
    store: Arc<dyn LeaseStore>,
    source: Arc<dyn FeedSource>,
    observer: Arc<dyn Observer>,
    hooks: Arc<dyn Hooks>,
    cancel: CancellationToken,
    owned: Arc<RwLock<HashMap<PartitionId, OwnedPartition>>>,
    reconcile_handle: RwLock<Option<JoinHandle<()>>>,
}

impl FeedProcessor {
    /// Create a new builder.
    pub fn builder() -> FeedProcessorBuilder {
        FeedProcessorBuilder::new()
    }

    /// The configuration this processor runs with.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Identity this process competes for leases under.
    pub fn owner(&self) -> &OwnerId {
        &self.config.owner
    }

    /// Token that stops the whole coordinator (reconciliation, all partition
    /// processors, and any lag monitor sharing it) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Partitions this process currently owns, sorted.
    pub async fn owned_partitions(&self) -> Vec<PartitionId> {
        let owned = self.owned.read().await;
        let mut ids: Vec<PartitionId> = owned.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Whether the reconcile loop is running.
    pub async fn is_started(&self) -> bool {
        self.reconcile_handle.read().await.is_some()
    }

    /// Start the reconcile loop.
    pub async fn start(&self) -> Result<()> {
        let mut handle_guard = self.reconcile_handle.write().await;
        if handle_guard.is_some() {
            return Err(ProcessorError::AlreadyStarted);
        }

        let task = ReconcileTask {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.source),
            observer: Arc::clone(&self.observer),
            hooks: Arc::clone(&self.hooks),
            owned: Arc::clone(&self.owned),
            cancel: self.cancel.clone(),
        };
        *handle_guard = Some(tokio::spawn(task.run()));

        info!(
            owner = %self.config.owner,
            group = %self.config.group_name,
            "Feed processor started"
        );
        Ok(())
    }

    /// Stop everything and release held leases.
    ///
    /// Cancelling [`shutdown_token`](Self::shutdown_token) instead also stops
    /// all tasks, but leaves leases to expire naturally.
    pub async fn stop(&self) -> Result<()> {
        self.cancel.cancel();

        if let Some(handle) = self.reconcile_handle.write().await.take() {
            let _ = handle.await;
        }

        let mut owned = self.owned.write().await;
        for (partition, entry) in owned.drain() {
            let _ = entry.handle.await;
            if let Err(e) = self
                .store
                .release(partition, self.config.owner.as_str())
                .await
            {
                warn!(
                    partition = %partition,
                    error = %e,
                    "Failed to release lease during shutdown"
                );
            }
            self.hooks.on_revoked(partition);
        }

        info!(owner = %self.config.owner, "Feed processor stopped");
        Ok(())
    }
}

/// Background task reconciling owned partitions against the lease store.
struct ReconcileTask {
    config: Arc<ProcessorConfig>,
    store: Arc<dyn LeaseStore>,
    source: Arc<dyn FeedSource>,
    observer: Arc<dyn Observer>,
    hooks: Arc<dyn Hooks>,
    owned: Arc<RwLock<HashMap<PartitionId, OwnedPartition>>>,
    cancel: CancellationToken,
}

impl ReconcileTask {
    async fn run(self) {
        info!(
            owner = %self.config.owner,
            interval_ms = self.config.lease_acquire_interval.as_millis() as u64,
            "Lease coordinator started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.lease_acquire_interval) => {}
            }
            self.reconcile_once().await;
        }

        info!(owner = %self.config.owner, "Lease coordinator stopped");
    }

    /// One cycle: sweep exited processors, renew held leases, race for free
    /// ones. Store errors never abort the coordinator.
    async fn reconcile_once(&self) {
        self.sweep_finished().await;

        let partitions = match self.source.partitions().await {
            Ok(partitions) => partitions,
            Err(e) => {
                warn!(error = %e, "Failed to list feed partitions; retrying next cycle");
                return;
            }
        };

        for partition in partitions {
            let is_owned = self.owned.read().await.contains_key(&partition);
            if is_owned {
                self.maybe_renew(partition).await;
            } else {
                self.maybe_acquire(partition).await;
            }
        }
    }

    /// Drop owned entries whose processor has exited (faulted or cancelled).
    async fn sweep_finished(&self) {
        let finished: Vec<PartitionId> = {
            let owned = self.owned.read().await;
            owned
                .iter()
                .filter(|(_, entry)| entry.handle.is_finished())
                .map(|(partition, _)| *partition)
                .collect()
        };

        for partition in finished {
            if self.owned.write().await.remove(&partition).is_some() {
                info!(
                    partition = %partition,
                    owner = %self.config.owner,
                    "Partition processor exited; ownership dropped"
                );
                self.hooks.on_revoked(partition);
            }
        }
    }

    async fn maybe_renew(&self, partition: PartitionId) {
        let due = {
            let owned = self.owned.read().await;
            match owned.get(&partition) {
                Some(entry) => entry.last_renewed.elapsed() >= self.config.lease_renew_interval,
                None => false,
            }
        };
        if !due {
            return;
        }

        match self
            .store
            .renew(partition, self.config.owner.as_str(), self.config.lease_ttl)
            .await
        {
            Ok(true) => {
                if let Some(entry) = self.owned.write().await.get_mut(&partition) {
                    entry.last_renewed = Instant::now();
                }
                debug!(partition = %partition, "Lease renewed");
            }
            Ok(false) => {
                warn!(
                    partition = %partition,
                    owner = %self.config.owner,
                    "Lease lost; stopping partition processor"
                );
                if let Some(entry) = self.owned.write().await.remove(&partition) {
                    entry.cancel.cancel();
                }
                self.hooks.on_revoked(partition);
            }
            Err(e) => {
                warn!(
                    partition = %partition,
                    error = %e,
                    "Lease renewal error; retrying next cycle"
                );
            }
        }
    }

    async fn maybe_acquire(&self, partition: PartitionId) {
        // Scan first: only race for records that are free, expired, or ours.
        let available = match self.store.read(partition).await {
            Ok(None) => true,
            Ok(Some(lease)) => {
                lease.owner_id.is_none()
                    || lease.owner_id.as_deref() == Some(self.config.owner.as_str())
                    || lease.is_expired(now_ms())
            }
            Err(e) => {
                warn!(partition = %partition, error = %e, "Lease read failed");
                return;
            }
        };
        if !available {
            return;
        }

        match self
            .store
            .try_acquire(partition, self.config.owner.as_str(), self.config.lease_ttl)
            .await
        {
            Ok(true) => self.start_partition(partition).await,
            Ok(false) => {
                debug!(partition = %partition, "Lost acquisition race");
            }
            Err(e) => {
                warn!(partition = %partition, error = %e, "Lease acquisition failed");
            }
        }
    }

    /// Spawn a partition processor resuming from the last accepted
    /// checkpoint (or the configured start position).
    async fn start_partition(&self, partition: PartitionId) {
        let stored = match self.store.read(partition).await {
            Ok(lease) => lease.and_then(|l| l.continuation),
            Err(e) => {
                warn!(partition = %partition, error = %e, "Lease read-back failed");
                return;
            }
        };

        let initial: Option<ContinuationToken> = match stored {
            Some(token) => Some(token),
            None if self.config.start_from_tail => {
                match self.source.latest_token(partition).await {
                    Ok(tail) => Some(tail),
                    Err(e) => {
                        // Without a tail position we cannot honor
                        // start_from_tail; give the lease back and retry.
                        warn!(
                            partition = %partition,
                            error = %e,
                            "Failed to read feed tail; deferring assignment"
                        );
                        if let Err(e) = self
                            .store
                            .release(partition, self.config.owner.as_str())
                            .await
                        {
                            warn!(partition = %partition, error = %e, "Release failed");
                        }
                        return;
                    }
                }
            }
            None => None,
        };

        info!(
            partition = %partition,
            owner = %self.config.owner,
            resume_from = initial.as_ref().map(|t| t.as_str()).unwrap_or("<beginning>"),
            "Partition assigned"
        );
        self.hooks.on_assigned(partition);

        let child_cancel = self.cancel.child_token();
        let worker = PartitionProcessor {
            partition,
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.source),
            observer: Arc::clone(&self.observer),
            hooks: Arc::clone(&self.hooks),
            cancel: child_cancel.clone(),
        };
        let handle = tokio::spawn(worker.run(initial));

        self.owned.write().await.insert(
            partition,
            OwnedPartition {
                handle,
                cancel: child_cancel,
                last_renewed: Instant::now(),
            },
        );
    }
}

/// Builder for [`FeedProcessor`].
pub struct FeedProcessorBuilder {
    config: ProcessorConfig,
    store: Option<Arc<dyn LeaseStore>>,
    source: Option<Arc<dyn FeedSource>>,
    observer: Option<Arc<dyn Observer>>,
    hooks: Arc<dyn Hooks>,
    cancel: Option<CancellationToken>,
}

impl FeedProcessorBuilder {
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            store: None,
            source: None,
            observer: None,
            hooks: Arc::new(TracingHooks),
            cancel: None,
        }
    }

    /// Set the lease store (required).
    pub fn store(mut self, store: Arc<dyn LeaseStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the feed source (required).
    pub fn source(mut self, source: Arc<dyn FeedSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the observer (required).
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Override the lifecycle notification hooks.
    pub fn hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Use an external cancellation token as the shutdown signal.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Override the derived owner identity.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.config.owner = OwnerId::from_name(owner);
        self
    }

    /// Name of the feed source, surfaced in delivery contexts.
    pub fn source_name(mut self, name: impl Into<String>) -> Self {
        self.config.source_name = name.into();
        self
    }

    /// Consumer group name, surfaced in delivery contexts.
    pub fn group_name(mut self, name: impl Into<String>) -> Self {
        self.config.group_name = name.into();
        self
    }

    /// Start never-before-checkpointed partitions at the feed tail.
    pub fn start_from_tail(mut self, from_tail: bool) -> Self {
        self.config.start_from_tail = from_tail;
        self
    }

    /// Cadence of the lease acquisition scan.
    pub fn lease_acquire_interval(mut self, interval: Duration) -> Self {
        self.config.lease_acquire_interval = interval;
        self
    }

    /// Interval between renewals of held leases.
    pub fn lease_renew_interval(mut self, interval: Duration) -> Self {
        self.config.lease_renew_interval = interval;
        self
    }

    /// Lease time-to-live.
    pub fn lease_ttl(mut self, ttl: Duration) -> Self {
        self.config.lease_ttl = ttl;
        self
    }

    /// Delay before re-polling an empty partition.
    pub fn feed_poll_delay(mut self, delay: Duration) -> Self {
        self.config.feed_poll_delay = delay;
        self
    }

    /// Upper bound on documents per fetch.
    pub fn max_items(mut self, max: usize) -> Self {
        self.config.max_items = Some(max);
        self
    }

    /// Build the processor.
    ///
    /// # Errors
    ///
    /// Returns `ProcessorError::Config` if a required collaborator is missing
    /// or the intervals cannot keep a lease alive.
    pub fn build(self) -> Result<FeedProcessor> {
        let store = self
            .store
            .ok_or_else(|| ProcessorError::Config("lease store required".to_string()))?;
        let source = self
            .source
            .ok_or_else(|| ProcessorError::Config("feed source required".to_string()))?;
        let observer = self
            .observer
            .ok_or_else(|| ProcessorError::Config("observer required".to_string()))?;
        self.config.validate()?;

        Ok(FeedProcessor {
            config: Arc::new(self.config),
            store,
            source,
            observer,
            hooks: self.hooks,
            cancel: self.cancel.unwrap_or_default(),
            owned: Arc::new(RwLock::new(HashMap::new())),
            reconcile_handle: RwLock::new(None),
        })
    }
}

impl Default for FeedProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
