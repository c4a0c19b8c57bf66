//! End-to-End Delivery Scenarios
//!
//! Tests that drive a full FeedProcessor against the in-memory feed and both
//! lease store backends:
//! - Checkpointed batches advance the persisted continuation token
//! - Skipped checkpoints lead to redelivery after a restart
//! - Multi-partition ownership and per-partition delivery
//! - start-from-tail positioning
//! - max_items bounds every delivered batch

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feedlease_core::{ChangeDocument, ContinuationToken, DeliveryContext, PartitionId};
use feedlease_processor::{Checkpoint, FeedProcessor, Observer};
use feedlease_source::{FeedSource, MemoryFeed};
use feedlease_store::{LeaseStore, MemoryLeaseStore, SqliteLeaseStore};
use tokio::sync::Mutex;

const P0: PartitionId = PartitionId::new(0);
const P1: PartitionId = PartitionId::new(1);
const P2: PartitionId = PartitionId::new(2);

const POLL: Duration = Duration::from_millis(10);
const POLL_ROUNDS: usize = 500; // 5s worth of polling

/// Observer that records every delivered batch and optionally checkpoints.
struct Recorder {
    batches: Mutex<Vec<(PartitionId, Vec<ChangeDocument>)>>,
    checkpoint_each: bool,
}

impl Recorder {
    fn new(checkpoint_each: bool) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            checkpoint_each,
        })
    }

    async fn payloads_for(&self, partition: PartitionId) -> Vec<Vec<u8>> {
        self.batches
            .lock()
            .await
            .iter()
            .filter(|(p, _)| *p == partition)
            .flat_map(|(_, docs)| docs.iter().map(|d| d.payload.to_vec()))
            .collect()
    }

    async fn batch_count(&self) -> usize {
        self.batches.lock().await.len()
    }
}

#[async_trait]
impl Observer for Recorder {
    async fn ingest(
        &self,
        context: DeliveryContext,
        checkpoint: Checkpoint,
        documents: Vec<ChangeDocument>,
    ) -> anyhow::Result<()> {
        self.batches
            .lock()
            .await
            .push((context.partition_id, documents));
        if self.checkpoint_each {
            checkpoint.commit().await?;
        }
        Ok(())
    }
}

fn fast_builder(
    store: Arc<dyn LeaseStore>,
    feed: Arc<MemoryFeed>,
    observer: Arc<dyn Observer>,
    owner: &str,
) -> FeedProcessor {
    FeedProcessor::builder()
        .store(store)
        .source(feed)
        .observer(observer)
        .owner(owner)
        .lease_acquire_interval(Duration::from_millis(25))
        .lease_renew_interval(Duration::from_millis(50))
        .lease_ttl(Duration::from_millis(400))
        .feed_poll_delay(Duration::from_millis(15))
        .build()
        .unwrap()
}

async fn stored_epoch(store: &Arc<dyn LeaseStore>, partition: PartitionId) -> Option<u64> {
    store
        .read(partition)
        .await
        .unwrap()
        .and_then(|l| l.continuation)
        .map(|t| t.epoch().unwrap())
}

/// Poll until the persisted checkpoint for `partition` reaches `epoch`.
async fn wait_for_epoch(store: &Arc<dyn LeaseStore>, partition: PartitionId, epoch: u64) {
    for _ in 0..POLL_ROUNDS {
        if stored_epoch(store, partition).await == Some(epoch) {
            return;
        }
        tokio::time::sleep(POLL).await;
    }
    panic!(
        "partition {} never reached checkpoint epoch {} (at {:?})",
        partition,
        epoch,
        stored_epoch(store, partition).await
    );
}

/// Scenario: partition 0 sits at token "0"; the first fetch yields three
/// documents and token "3"; the observer checkpoints; the persisted lease
/// shows token "3".
#[tokio::test]
async fn test_checkpointed_batch_advances_lease() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let feed = Arc::new(MemoryFeed::new());
    for payload in ["a", "b", "c"] {
        feed.push(P0, payload).await;
    }

    // Seed the record at token "0" (an earlier consumer checkpointed there).
    store
        .try_acquire(P0, "seed", Duration::from_secs(1))
        .await
        .unwrap();
    store
        .checkpoint(P0, "seed", &ContinuationToken::new("0"))
        .await
        .unwrap();
    store.release(P0, "seed").await.unwrap();

    let observer = Recorder::new(true);
    let processor = fast_builder(
        Arc::clone(&store),
        Arc::clone(&feed),
        Arc::clone(&observer) as Arc<dyn Observer>,
        "proc-a",
    );
    processor.start().await.unwrap();

    wait_for_epoch(&store, P0, 3).await;

    let payloads = observer.payloads_for(P0).await;
    assert_eq!(payloads, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

    processor.stop().await.unwrap();
}

/// Scenario: the observer never checkpoints; after a restart the next
/// processor fetches the very same documents again.
#[tokio::test]
async fn test_skipped_checkpoint_redelivers_after_restart() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let feed = Arc::new(MemoryFeed::new());
    feed.push(P1, "x").await;
    feed.push(P1, "y").await;

    // First process: delivers but never checkpoints.
    let forgetful = Recorder::new(false);
    let first = fast_builder(
        Arc::clone(&store),
        Arc::clone(&feed),
        Arc::clone(&forgetful) as Arc<dyn Observer>,
        "proc-a",
    );
    first.start().await.unwrap();

    let mut delivered = false;
    for _ in 0..POLL_ROUNDS {
        if forgetful.batch_count().await >= 1 {
            delivered = true;
            break;
        }
        tokio::time::sleep(POLL).await;
    }
    assert!(delivered, "first process never delivered the batch");
    first.stop().await.unwrap();

    assert_eq!(stored_epoch(&store, P1).await, None, "nothing was persisted");

    // "Restart": a fresh process sees the same documents again.
    let replay = Recorder::new(true);
    let second = fast_builder(
        Arc::clone(&store),
        Arc::clone(&feed),
        Arc::clone(&replay) as Arc<dyn Observer>,
        "proc-b",
    );
    second.start().await.unwrap();

    wait_for_epoch(&store, P1, 2).await;

    assert_eq!(
        replay.payloads_for(P1).await,
        vec![b"x".to_vec(), b"y".to_vec()]
    );
    second.stop().await.unwrap();
}

#[tokio::test]
async fn test_owns_and_delivers_all_partitions() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let feed = Arc::new(MemoryFeed::new());
    feed.push(P0, "p0-a").await;
    feed.push(P1, "p1-a").await;
    feed.push(P2, "p2-a").await;

    let observer = Recorder::new(true);
    let processor = fast_builder(
        Arc::clone(&store),
        Arc::clone(&feed),
        Arc::clone(&observer) as Arc<dyn Observer>,
        "proc-a",
    );
    processor.start().await.unwrap();

    wait_for_epoch(&store, P0, 1).await;
    wait_for_epoch(&store, P1, 1).await;
    wait_for_epoch(&store, P2, 1).await;

    assert_eq!(processor.owned_partitions().await, vec![P0, P1, P2]);
    assert_eq!(observer.payloads_for(P1).await, vec![b"p1-a".to_vec()]);

    processor.stop().await.unwrap();
    assert!(processor.owned_partitions().await.is_empty());

    // Stop released the leases.
    let lease = store.read(P0).await.unwrap().unwrap();
    assert!(lease.owner_id.is_none());
}

#[tokio::test]
async fn test_start_from_tail_skips_existing_documents() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let feed = Arc::new(MemoryFeed::new());
    for payload in ["old-1", "old-2", "old-3"] {
        feed.push(P0, payload).await;
    }

    let observer = Recorder::new(true);
    let processor = FeedProcessor::builder()
        .store(Arc::clone(&store))
        .source(Arc::clone(&feed) as Arc<dyn FeedSource>)
        .observer(Arc::clone(&observer) as Arc<dyn Observer>)
        .owner("proc-tail")
        .start_from_tail(true)
        .lease_acquire_interval(Duration::from_millis(25))
        .lease_renew_interval(Duration::from_millis(50))
        .lease_ttl(Duration::from_millis(400))
        .feed_poll_delay(Duration::from_millis(15))
        .build()
        .unwrap();
    processor.start().await.unwrap();

    let mut owned = false;
    for _ in 0..POLL_ROUNDS {
        if !processor.owned_partitions().await.is_empty() {
            owned = true;
            break;
        }
        tokio::time::sleep(POLL).await;
    }
    assert!(owned, "partition never assigned");

    feed.push(P0, "new-1").await;

    wait_for_epoch(&store, P0, 4).await;

    assert_eq!(observer.payloads_for(P0).await, vec![b"new-1".to_vec()]);
    processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_max_items_bounds_every_batch() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let feed = Arc::new(MemoryFeed::new());
    for i in 0..10 {
        feed.push(P0, format!("doc-{}", i)).await;
    }

    let observer = Recorder::new(true);
    let processor = FeedProcessor::builder()
        .store(Arc::clone(&store))
        .source(Arc::clone(&feed) as Arc<dyn FeedSource>)
        .observer(Arc::clone(&observer) as Arc<dyn Observer>)
        .owner("proc-bounded")
        .max_items(3)
        .lease_acquire_interval(Duration::from_millis(25))
        .lease_renew_interval(Duration::from_millis(50))
        .lease_ttl(Duration::from_millis(400))
        .feed_poll_delay(Duration::from_millis(15))
        .build()
        .unwrap();
    processor.start().await.unwrap();

    wait_for_epoch(&store, P0, 10).await;
    processor.stop().await.unwrap();

    let batches = observer.batches.lock().await;
    assert!(batches.len() >= 4, "ten documents cannot fit in three batches");
    for (_, docs) in batches.iter() {
        assert!(docs.len() <= 3, "batch exceeded max_items");
    }

    let all: Vec<Vec<u8>> = batches
        .iter()
        .flat_map(|(_, docs)| docs.iter().map(|d| d.payload.to_vec()))
        .collect();
    let expected: Vec<Vec<u8>> = (0..10)
        .map(|i| format!("doc-{}", i).into_bytes())
        .collect();
    assert_eq!(all, expected, "delivery preserved feed order");
}

/// The same delivery path, exercised through the SQLite backend.
#[tokio::test]
async fn test_delivery_against_sqlite_store() {
    let store: Arc<dyn LeaseStore> = Arc::new(SqliteLeaseStore::new_in_memory().await.unwrap());
    let feed = Arc::new(MemoryFeed::new());
    for payload in ["a", "b", "c"] {
        feed.push(P0, payload).await;
    }

    let observer = Recorder::new(true);
    let processor = fast_builder(
        Arc::clone(&store),
        Arc::clone(&feed),
        Arc::clone(&observer) as Arc<dyn Observer>,
        "proc-sqlite",
    );
    processor.start().await.unwrap();

    wait_for_epoch(&store, P0, 3).await;

    processor.stop().await.unwrap();
}
