//! Demand-driven partition consumer with backpressure.
//!
//! One `PartitionConsumer` per assigned `(group, topic, partition)`:
//! - fetches from the broker only while the subscriber has signaled demand,
//! - delivers records downstream in ascending offset order,
//! - commits offsets independently of delivery per the configured strategy.

pub mod options;
pub mod partition;
pub mod policy;
pub mod subscriber;
pub mod tracker;

pub use options::ConsumerOptions;
pub use partition::{PartitionConsumer, PartitionConsumerHandle};
pub use policy::{AutoOffsetReset, CommitDecision, CommitPolicy, CommitStrategy};
pub use subscriber::{subscriber, RecordBatch, SubscriberFactory};
pub use tracker::{Offsets, OffsetTracker};
