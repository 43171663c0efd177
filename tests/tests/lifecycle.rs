//! Lifecycle paths: initial offset load, fatal and transient errors,
//! linked subscriber shutdown, and termination bookkeeping.

use broker::BrokerClient;
use consumer::{subscriber, AutoOffsetReset, ConsumerOptions, PartitionConsumer};
use integration_tests::mocks::{CommittedOffset, MockBroker, MockFetch};
use integration_tests::{collector, delivered, records, wait_for, WAIT};
use siphon_core::Error;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_partition_query() {
    let broker = MockBroker::new("events", 3);
    let (factory, _batches) = collector();
    let (handle, join) = PartitionConsumer::spawn(
        "g",
        broker.clone() as Arc<dyn BrokerClient>,
        factory,
        ConsumerOptions::default(),
    );

    assert_eq!(handle.partition(), ("events", 3));

    handle.stop().await.unwrap();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_initial_load_unknown_topic_falls_back_to_earliest() {
    let broker = MockBroker::new("events", 0);
    broker.set_committed(CommittedOffset::UnknownTopic);
    broker.set_earliest(7);
    broker.push_batch(records(7, 2));

    let (factory, batches) = collector();
    let (handle, join) = PartitionConsumer::spawn(
        "g",
        broker.clone() as Arc<dyn BrokerClient>,
        factory,
        ConsumerOptions::default(),
    );

    handle.ask(2).await.unwrap();
    assert!(wait_for(|| delivered(&batches).len() == 2, WAIT).await);
    assert_eq!(broker.fetch_offsets(), vec![7]);

    handle.stop().await.unwrap();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_initial_load_without_stored_offset_uses_earliest() {
    let broker = MockBroker::new("events", 0);
    broker.set_committed(CommittedOffset::NoneStored);
    broker.set_earliest(2);

    let (factory, _batches) = collector();
    let (handle, join) = PartitionConsumer::spawn(
        "g",
        broker.clone() as Arc<dyn BrokerClient>,
        factory,
        ConsumerOptions::default(),
    );

    handle.ask(1).await.unwrap();
    assert!(wait_for(|| !broker.fetch_offsets().is_empty(), WAIT).await);
    assert_eq!(broker.fetch_offsets()[0], 2);

    handle.stop().await.unwrap();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_zero_demand_does_nothing() {
    let broker = MockBroker::new("events", 0);
    let (factory, _batches) = collector();
    let (handle, join) = PartitionConsumer::spawn(
        "g",
        broker.clone() as Arc<dyn BrokerClient>,
        factory,
        ConsumerOptions::default(),
    );

    handle.ask(0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(broker.fetch_offsets().is_empty());
    assert!(broker.commit_attempts().is_empty());

    handle.stop().await.unwrap();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_offset_out_of_range_without_reset_policy_is_fatal() {
    let broker = MockBroker::new("events", 0);
    broker.set_committed(CommittedOffset::Stored(50));
    broker.push_fetch(MockFetch::OffsetOutOfRange);

    let (factory, _batches) = collector();
    let (handle, join) = PartitionConsumer::spawn(
        "g",
        broker.clone() as Arc<dyn BrokerClient>,
        factory,
        ConsumerOptions {
            auto_offset_reset: AutoOffsetReset::None,
            ..ConsumerOptions::default()
        },
    );

    handle.ask(5).await.unwrap();
    let result = join.await.unwrap();
    assert!(matches!(result, Err(Error::OffsetOutOfRange { .. })));

    // the consumer is gone; further signals report that
    assert!(matches!(handle.ask(1).await, Err(Error::Stopped)));
}

#[tokio::test]
async fn test_unrecoverable_fetch_error_is_fatal() {
    let broker = MockBroker::new("events", 0);
    broker.set_committed(CommittedOffset::Stored(0));
    broker.push_fetch(MockFetch::Fatal);

    let (factory, _batches) = collector();
    let (handle, join) = PartitionConsumer::spawn(
        "g",
        broker.clone() as Arc<dyn BrokerClient>,
        factory,
        ConsumerOptions::default(),
    );

    handle.ask(5).await.unwrap();
    let result = join.await.unwrap();
    assert!(matches!(result, Err(Error::Broker(_))));
}

#[tokio::test]
async fn test_transient_fetch_error_is_absorbed() {
    let broker = MockBroker::new("events", 0);
    broker.set_committed(CommittedOffset::Stored(0));
    broker.push_fetch(MockFetch::Transient);
    broker.push_batch(records(0, 5));

    let (factory, batches) = collector();
    let (handle, join) = PartitionConsumer::spawn(
        "g",
        broker.clone() as Arc<dyn BrokerClient>,
        factory,
        ConsumerOptions::default(),
    );

    handle.ask(5).await.unwrap();
    assert!(wait_for(|| delivered(&batches).len() == 5, WAIT).await);

    // the failed step retried from the same offset without mutating state
    assert_eq!(broker.fetch_offsets(), vec![0, 0]);

    handle.stop().await.unwrap();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_termination_flushes_pending_progress() {
    let broker = MockBroker::new("events", 0);
    broker.set_committed(CommittedOffset::Stored(40));
    broker.push_batch(records(40, 2));

    let (factory, batches) = collector();
    let (handle, join) = PartitionConsumer::spawn(
        "g",
        broker.clone() as Arc<dyn BrokerClient>,
        factory,
        ConsumerOptions::default(),
    );

    handle.ask(2).await.unwrap();
    assert!(wait_for(|| delivered(&batches).len() == 2, WAIT).await);
    assert!(broker.commit_attempts().is_empty());

    handle.stop().await.unwrap();
    join.await.unwrap().unwrap();

    assert_eq!(broker.commits(), vec![42]);
    // the consumer released its broker worker; only the test holds it now
    assert_eq!(Arc::strong_count(&broker), 1);
}

#[tokio::test]
async fn test_subscriber_exit_terminates_consumer() {
    let broker = MockBroker::new("events", 0);
    broker.set_committed(CommittedOffset::Stored(0));
    broker.push_batch(records(0, 5));

    // a subscriber that asks once, takes one delivery, and leaves
    let factory = subscriber(|handle, _topic_partition, mut records| async move {
        handle.ask(5).await.unwrap();
        while let Some(batch) = records.recv().await {
            if !batch.is_empty() {
                break;
            }
        }
    });

    let (_handle, join) = PartitionConsumer::spawn(
        "g",
        broker.clone() as Arc<dyn BrokerClient>,
        factory,
        ConsumerOptions::default(),
    );

    // linked shutdown: subscriber death ends the consumer, which still
    // flushes its pending progress on the way out
    join.await.unwrap().unwrap();
    assert_eq!(broker.commits(), vec![5]);
}
