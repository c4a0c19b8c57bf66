//! Processor configuration
//!
//! All knobs have defaults; explicit values override. The configuration is
//! built once at startup (see `FeedProcessor::builder`) and never mutated at
//! runtime.
//!
//! | field                   | default                  |
//! |-------------------------|--------------------------|
//! | `source_name`           | `"feed"`                 |
//! | `group_name`            | `"default"`              |
//! | `owner`                 | derived from host/exe/pid|
//! | `start_from_tail`       | `false` (from beginning) |
//! | `lease_acquire_interval`| 1s                       |
//! | `lease_renew_interval`  | 3s                       |
//! | `lease_ttl`             | 10s                      |
//! | `feed_poll_delay`       | 1s                       |
//! | `max_items`             | unbounded                |

use std::time::Duration;

use feedlease_core::OwnerId;

use crate::error::{ProcessorError, Result};

/// Default polling cadence for lease acquisition scans.
pub const DEFAULT_LEASE_ACQUIRE_INTERVAL: Duration = Duration::from_secs(1);

/// Default interval between renewals of a held lease.
pub const DEFAULT_LEASE_RENEW_INTERVAL: Duration = Duration::from_secs(3);

/// Default lease TTL; a lease not renewed within this window may be taken
/// over by any competing process.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(10);

/// Default delay before re-polling a partition that had no new documents.
pub const DEFAULT_FEED_POLL_DELAY: Duration = Duration::from_secs(1);

/// Processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Name of the feed source, surfaced in delivery contexts
    pub source_name: String,

    /// Consumer group name, surfaced in delivery contexts
    pub group_name: String,

    /// Identity of this consumer process
    pub owner: OwnerId,

    /// Whether a never-before-checkpointed partition starts at the feed's
    /// current tail instead of the beginning
    pub start_from_tail: bool,

    /// Cadence of the lease acquisition scan
    pub lease_acquire_interval: Duration,

    /// Interval between renewals of held leases
    pub lease_renew_interval: Duration,

    /// Lease time-to-live
    pub lease_ttl: Duration,

    /// Delay before re-polling an empty partition
    pub feed_poll_delay: Duration,

    /// Upper bound on documents per fetch (the source may impose its own)
    pub max_items: Option<usize>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            source_name: "feed".to_string(),
            group_name: "default".to_string(),
            owner: OwnerId::derive(),
            start_from_tail: false,
            lease_acquire_interval: DEFAULT_LEASE_ACQUIRE_INTERVAL,
            lease_renew_interval: DEFAULT_LEASE_RENEW_INTERVAL,
            lease_ttl: DEFAULT_LEASE_TTL,
            feed_poll_delay: DEFAULT_FEED_POLL_DELAY,
            max_items: None,
        }
    }
}

impl ProcessorConfig {
    /// Reject configurations that cannot keep a lease alive.
    pub fn validate(&self) -> Result<()> {
        if self.lease_ttl.is_zero()
            || self.lease_acquire_interval.is_zero()
            || self.lease_renew_interval.is_zero()
        {
            return Err(ProcessorError::Config(
                "lease intervals must be non-zero".to_string(),
            ));
        }
        if self.lease_renew_interval >= self.lease_ttl {
            return Err(ProcessorError::Config(format!(
                "lease_renew_interval ({:?}) must be shorter than lease_ttl ({:?})",
                self.lease_renew_interval, self.lease_ttl
            )));
        }
        if self.max_items == Some(0) {
            return Err(ProcessorError::Config(
                "max_items must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
