//! Unified error types for the partition consumer.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the partition consumer.
///
/// Variants follow the broker error taxonomy: `OffsetOutOfRange` and
/// `UnknownTopicOrPartition` are recoverable by policy, `Transient` is
/// absorbed and retried on the next tick, everything else is fatal for
/// the consumer that hits it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("offset {offset} out of range for {topic}/{partition}")]
    OffsetOutOfRange {
        topic: String,
        partition: i32,
        offset: i64,
    },

    #[error("unknown topic or partition: {topic}/{partition}")]
    UnknownTopicOrPartition { topic: String, partition: i32 },

    #[error("transient broker error: {0}")]
    Transient(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("subscriber error: {0}")]
    Subscriber(String),

    #[error("partition consumer stopped")]
    Stopped,
}

impl Error {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn broker(msg: impl Into<String>) -> Self {
        Self::Broker(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn subscriber(msg: impl Into<String>) -> Self {
        Self::Subscriber(msg.into())
    }

    /// Transient errors never mutate offsets and are retried on the next
    /// tick rather than terminating the consumer.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
