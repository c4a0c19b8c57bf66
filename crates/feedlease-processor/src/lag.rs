//! Lag Monitor
//!
//! Background loop estimating per-partition backlog, fully isolated from the
//! consumption path: it shares only read access to the feed source, so an
//! estimation failure can never affect partition ownership or delivery.
//!
//! ## Pacing
//!
//! The caller-supplied sink controls the cadence: each round hands it the
//! sorted samples and the next estimation round starts only when the sink
//! returns. A sink that sleeps ten seconds before returning yields one
//! estimation every ten seconds.
//!
//! ## Example
//!
//! ```ignore
//! use feedlease_processor::LagMonitor;
//! use tokio_util::sync::CancellationToken;
//! use std::time::Duration;
//!
//! let cancel = CancellationToken::new();
//! let monitor = LagMonitor::new(feed);
//! tokio::spawn(monitor.run(
//!     |samples| async move {
//!         for sample in &samples {
//!             println!("partition {}: {} behind", sample.partition_id, sample.backlog);
//!         }
//!         tokio::time::sleep(Duration::from_secs(10)).await;
//!     },
//!     cancel.clone(),
//! ));
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use feedlease_core::LagSample;
use feedlease_source::FeedSource;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Delay before retrying after a failed estimation round.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Cancellable background backlog estimator.
pub struct LagMonitor {
    source: Arc<dyn FeedSource>,
    retry_delay: Duration,
}

impl LagMonitor {
    pub fn new(source: Arc<dyn FeedSource>) -> Self {
        Self {
            source,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the delay applied after a failed estimation round.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run until `cancel` fires. Conceptually infinite - there is no other
    /// completion state.
    ///
    /// Samples are sorted by partition id before each delivery to the sink.
    /// Estimation failures are logged and retried; they never propagate.
    pub async fn run<F, Fut>(self, mut sink: F, cancel: CancellationToken)
    where
        F: FnMut(Vec<LagSample>) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        info!("Lag monitor started");
        let mut rounds: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.source.estimate_backlog().await {
                Ok(mut samples) => {
                    samples.sort_by_key(|s| s.partition_id);
                    rounds += 1;
                    // The sink paces the loop by delaying before returning.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sink(samples) => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Backlog estimation failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        info!(rounds = rounds, "Lag monitor stopped");
    }
}
