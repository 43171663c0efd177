//! Mock implementations for testing.

use async_trait::async_trait;
use broker::{BrokerClient, FetchOptions};
use parking_lot::Mutex;
use siphon_core::{Error, Record, Result, TopicPartition};
use std::collections::VecDeque;
use std::sync::Arc;

/// One scripted fetch outcome.
pub enum MockFetch {
    Batch(Vec<Record>),
    OffsetOutOfRange,
    Transient,
    Fatal,
}

/// What the mock reports for the group's committed offset.
#[derive(Debug, Clone, Copy)]
pub enum CommittedOffset {
    Stored(i64),
    NoneStored,
    UnknownTopic,
}

struct MockState {
    fetches: VecDeque<MockFetch>,
    fetch_offsets: Vec<i64>,
    committed: CommittedOffset,
    commit_attempts: Vec<i64>,
    commits: Vec<i64>,
    earliest: i64,
    latest: i64,
    fail_commits: bool,
}

/// Scripted broker behind the `BrokerClient` trait.
///
/// Fetch outcomes are consumed in order; once the script is drained every
/// further fetch returns an empty batch. All calls are captured so tests
/// can assert the exact RPC sequence the consumer issued.
pub struct MockBroker {
    topic_partition: TopicPartition,
    state: Mutex<MockState>,
}

impl MockBroker {
    pub fn new(topic: &str, partition: i32) -> Arc<Self> {
        Arc::new(Self {
            topic_partition: TopicPartition::new(topic, partition),
            state: Mutex::new(MockState {
                fetches: VecDeque::new(),
                fetch_offsets: Vec::new(),
                committed: CommittedOffset::NoneStored,
                commit_attempts: Vec::new(),
                commits: Vec::new(),
                earliest: 0,
                latest: 0,
                fail_commits: false,
            }),
        })
    }

    pub fn push_fetch(&self, outcome: MockFetch) {
        self.state.lock().fetches.push_back(outcome);
    }

    pub fn push_batch(&self, records: Vec<Record>) {
        self.push_fetch(MockFetch::Batch(records));
    }

    pub fn set_committed(&self, committed: CommittedOffset) {
        self.state.lock().committed = committed;
    }

    pub fn set_earliest(&self, offset: i64) {
        self.state.lock().earliest = offset;
    }

    pub fn set_latest(&self, offset: i64) {
        self.state.lock().latest = offset;
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.state.lock().fail_commits = fail;
    }

    /// Offsets of every fetch the consumer issued, in order.
    pub fn fetch_offsets(&self) -> Vec<i64> {
        self.state.lock().fetch_offsets.clone()
    }

    /// Every commit RPC attempted, successful or not.
    pub fn commit_attempts(&self) -> Vec<i64> {
        self.state.lock().commit_attempts.clone()
    }

    /// Successfully committed offsets, in order.
    pub fn commits(&self) -> Vec<i64> {
        self.state.lock().commits.clone()
    }

    /// The committed offset as the broker now sees it.
    pub fn broker_committed(&self) -> Option<i64> {
        match self.state.lock().committed {
            CommittedOffset::Stored(offset) => Some(offset),
            _ => None,
        }
    }
}

#[async_trait]
impl BrokerClient for MockBroker {
    fn topic_partition(&self) -> &TopicPartition {
        &self.topic_partition
    }

    async fn fetch(&self, offset: i64, _options: &FetchOptions) -> Result<Vec<Record>> {
        let mut state = self.state.lock();
        state.fetch_offsets.push(offset);
        match state.fetches.pop_front() {
            Some(MockFetch::Batch(records)) => Ok(records),
            Some(MockFetch::OffsetOutOfRange) => Err(Error::OffsetOutOfRange {
                topic: self.topic_partition.topic.clone(),
                partition: self.topic_partition.partition,
                offset,
            }),
            Some(MockFetch::Transient) => Err(Error::transient("mock connection reset")),
            Some(MockFetch::Fatal) => Err(Error::broker("mock corrupt message")),
            None => Ok(Vec::new()),
        }
    }

    async fn committed_offset(&self, _group: &str) -> Result<Option<i64>> {
        match self.state.lock().committed {
            CommittedOffset::Stored(offset) => Ok(Some(offset)),
            CommittedOffset::NoneStored => Ok(None),
            CommittedOffset::UnknownTopic => Err(Error::UnknownTopicOrPartition {
                topic: self.topic_partition.topic.clone(),
                partition: self.topic_partition.partition,
            }),
        }
    }

    async fn commit(&self, _group: &str, offset: i64) -> Result<()> {
        let mut state = self.state.lock();
        state.commit_attempts.push(offset);
        if state.fail_commits {
            return Err(Error::transient("mock commit failure"));
        }
        state.commits.push(offset);
        state.committed = CommittedOffset::Stored(offset);
        Ok(())
    }

    async fn earliest_offset(&self) -> Result<i64> {
        Ok(self.state.lock().earliest)
    }

    async fn latest_offset(&self) -> Result<i64> {
        Ok(self.state.lock().latest)
    }
}
