//! The broker client capability consumed by the partition consumer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use siphon_core::{Record, Result, TopicPartition};

/// Options applied to every fetch issued by a partition consumer.
///
/// There is no auto-commit knob on this path: the consumer owns commit
/// timing entirely, so the trait simply does not model broker-side
/// auto-commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Lower bound on bytes the broker should accumulate before replying.
    #[serde(default = "default_min_bytes")]
    pub min_bytes: i32,
    /// Upper bound on bytes returned by a single fetch.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: i32,
    /// How long the broker may block waiting for `min_bytes`.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: i32,
}

fn default_min_bytes() -> i32 {
    1
}

fn default_max_bytes() -> i32 {
    1024 * 1024
}

fn default_max_wait_ms() -> i32 {
    500
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            min_bytes: default_min_bytes(),
            max_bytes: default_max_bytes(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

/// A dedicated broker session for one topic partition.
///
/// Each partition consumer owns exactly one instance; nothing else may use
/// it. Implementations map broker failures onto the core error taxonomy:
/// `Error::OffsetOutOfRange` and `Error::UnknownTopicOrPartition` for the
/// recoverable protocol codes, `Error::Transient` for connection-level
/// trouble, `Error::Broker` for everything unrecoverable.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// The partition this session is bound to.
    fn topic_partition(&self) -> &TopicPartition;

    /// Fetch records starting at `offset`, in ascending offset order.
    async fn fetch(&self, offset: i64, options: &FetchOptions) -> Result<Vec<Record>>;

    /// The committed offset for `group` on this partition, or `None` when
    /// the broker has no offset stored for the group yet.
    async fn committed_offset(&self, group: &str) -> Result<Option<i64>>;

    /// Durably commit `offset` for `group` on this partition.
    async fn commit(&self, group: &str, offset: i64) -> Result<()>;

    /// The earliest offset currently retained by the broker.
    async fn earliest_offset(&self) -> Result<i64>;

    /// The offset one past the last record in the partition.
    async fn latest_offset(&self) -> Result<i64>;
}
