//! The downstream subscriber contract.
//!
//! At start the consumer invokes a user-supplied factory with its own
//! handle, the partition identity, and the receiving end of the record
//! channel, and gets back the subscriber's join handle. The two are linked:
//! the consumer watches the join handle and terminates when the subscriber
//! dies; consumer termination closes the record channel and aborts the
//! subscriber task.

use crate::partition::PartitionConsumerHandle;
use siphon_core::{Record, TopicPartition};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One delivery to the subscriber: records in ascending offset order.
pub type RecordBatch = Vec<Record>;

/// Starts the downstream subscriber.
///
/// The subscriber signals demand through the handle (`ask`) and receives
/// record batches on the channel. Extra subscriber arguments travel by
/// closure capture.
pub type SubscriberFactory = Box<
    dyn FnOnce(
            PartitionConsumerHandle,
            TopicPartition,
            mpsc::Receiver<RecordBatch>,
        ) -> JoinHandle<()>
        + Send,
>;

/// Wraps an async function into a `SubscriberFactory`, spawning it as the
/// subscriber task.
pub fn subscriber<F, Fut>(f: F) -> SubscriberFactory
where
    F: FnOnce(PartitionConsumerHandle, TopicPartition, mpsc::Receiver<RecordBatch>) -> Fut
        + Send
        + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move |handle, topic_partition, records| {
        tokio::spawn(f(handle, topic_partition, records))
    })
}
