//! Shared helpers for the siphon integration tests.

pub mod mocks;

use consumer::{subscriber, RecordBatch, SubscriberFactory};
use parking_lot::Mutex;
use siphon_core::Record;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Build `count` records starting at `start`, consecutive offsets.
pub fn records(start: i64, count: usize) -> Vec<Record> {
    (0..count as i64)
        .map(|i| Record {
            offset: start + i,
            key: None,
            value: Some(format!("record-{}", start + i).into_bytes()),
            timestamp: 1_700_000_000_000 + start + i,
        })
        .collect()
}

/// A subscriber that only collects deliveries; demand is driven by the test
/// through the consumer handle.
pub fn collector() -> (SubscriberFactory, Arc<Mutex<Vec<RecordBatch>>>) {
    let batches: Arc<Mutex<Vec<RecordBatch>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = batches.clone();
    let factory = subscriber(move |_handle, _topic_partition, mut records| async move {
        while let Some(batch) = records.recv().await {
            sink.lock().push(batch);
        }
    });
    (factory, batches)
}

/// All non-empty delivered records, flattened in delivery order.
pub fn delivered(batches: &Mutex<Vec<RecordBatch>>) -> Vec<Record> {
    batches.lock().iter().flatten().cloned().collect()
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_for<F>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Default wait for consumer progress in tests.
pub const WAIT: Duration = Duration::from_millis(500);
