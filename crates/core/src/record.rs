//! Record and partition identity types shared across the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a topic partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

/// A single record fetched from a partition.
///
/// `timestamp` is unix milliseconds as stamped by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Broker-assigned offset within the partition.
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub timestamp: i64,
}

impl Record {
    /// The next offset after this record.
    pub fn next_offset(&self) -> i64 {
        self.offset + 1
    }
}
