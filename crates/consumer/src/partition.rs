//! The per-partition consumer: one long-lived task that reconciles
//! downstream demand, broker fetch results, and timer-driven commits.
//!
//! All state lives on the task; ingress is an mpsc command channel, egress
//! is the bounded record channel handed to the subscriber. Demand is met one
//! fetch step per tick, and a tick is only armed while demand is
//! outstanding, so an idle subscriber costs nothing.

use crate::options::ConsumerOptions;
use crate::policy::{AutoOffsetReset, CommitDecision, CommitPolicy, CommitStrategy};
use crate::subscriber::{RecordBatch, SubscriberFactory};
use crate::tracker::OffsetTracker;
use broker::{BrokerClient, BrokerConfig, KafkaBroker};
use siphon_core::{Error, Result, TopicPartition};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant as TokioInstant};
use tracing::{debug, error, info, warn};

/// Wakeup delay after a demand signal.
const TICK_AFTER_DEMAND: Duration = Duration::from_millis(5);
/// Wakeup delay between fetch steps while demand remains.
const TICK_AFTER_STEP: Duration = Duration::from_millis(10);

/// Command ingress capacity. Small: senders are the subscriber and the
/// runtime, both of which send rarely.
const COMMAND_CAPACITY: usize = 32;

enum Command {
    Ask(usize),
    TriggerCommit {
        strategy: CommitStrategy,
        offset: i64,
    },
    Stop,
}

enum Flow {
    Continue,
    Stop,
}

/// Cheap-to-clone handle to a running partition consumer.
#[derive(Clone)]
pub struct PartitionConsumerHandle {
    topic_partition: TopicPartition,
    commands: mpsc::Sender<Command>,
}

impl PartitionConsumerHandle {
    /// The `(topic, partition)` this consumer serves. Synchronous query.
    pub fn partition(&self) -> (&str, i32) {
        (
            &self.topic_partition.topic,
            self.topic_partition.partition,
        )
    }

    pub fn topic_partition(&self) -> &TopicPartition {
        &self.topic_partition
    }

    /// Signal how many records the subscriber wants next.
    pub async fn ask(&self, demand: usize) -> Result<()> {
        self.send(Command::Ask(demand)).await
    }

    /// Raise the acked mark to `offset` and run the commit policy once with
    /// `strategy`. No-op for offsets at or below the current acked mark.
    pub async fn trigger_commit(&self, strategy: CommitStrategy, offset: i64) -> Result<()> {
        self.send(Command::TriggerCommit { strategy, offset }).await
    }

    /// Ask the consumer to terminate (final commit attempt, then shutdown).
    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::Stopped)
    }
}

/// One partition consumer instance for `(group, topic, partition)`.
pub struct PartitionConsumer {
    group: String,
    topic_partition: TopicPartition,
    worker: Arc<dyn BrokerClient>,
    options: ConsumerOptions,
    policy: CommitPolicy,
    tracker: OffsetTracker,
    commands: mpsc::Receiver<Command>,
    records: mpsc::Sender<RecordBatch>,
    next_tick: Option<TokioInstant>,
}

impl PartitionConsumer {
    /// Creates the broker worker for `(topic, partition)`, spawns and links
    /// the subscriber, and starts the consumer task.
    ///
    /// Offsets are not loaded here; that happens on the first demand signal.
    pub async fn start(
        group: impl Into<String>,
        topic: impl Into<String>,
        partition: i32,
        subscriber_factory: SubscriberFactory,
        broker_config: &BrokerConfig,
        options: ConsumerOptions,
    ) -> Result<(PartitionConsumerHandle, JoinHandle<Result<()>>)> {
        let topic_partition = TopicPartition::new(topic, partition);
        let worker = KafkaBroker::connect(broker_config, topic_partition).await?;
        Ok(Self::spawn(group, Arc::new(worker), subscriber_factory, options))
    }

    /// Starts a consumer over an existing broker session.
    pub fn spawn(
        group: impl Into<String>,
        worker: Arc<dyn BrokerClient>,
        subscriber_factory: SubscriberFactory,
        options: ConsumerOptions,
    ) -> (PartitionConsumerHandle, JoinHandle<Result<()>>) {
        let group = group.into();
        let topic_partition = worker.topic_partition().clone();

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (records_tx, records_rx) = mpsc::channel(options.channel_capacity.max(1));

        let handle = PartitionConsumerHandle {
            topic_partition: topic_partition.clone(),
            commands: commands_tx,
        };

        let subscriber =
            subscriber_factory(handle.clone(), topic_partition.clone(), records_rx);

        let policy = CommitPolicy::new(options.commit_interval(), options.commit_threshold);

        let consumer = Self {
            group,
            topic_partition,
            worker,
            options,
            policy,
            tracker: OffsetTracker::new(),
            commands: commands_rx,
            records: records_tx,
            next_tick: None,
        };

        let join = tokio::spawn(consumer.run(subscriber));
        (handle, join)
    }

    async fn run(mut self, mut subscriber: JoinHandle<()>) -> Result<()> {
        info!(
            group = %self.group,
            topic = %self.topic_partition.topic,
            partition = self.topic_partition.partition,
            "Partition consumer started"
        );

        let result = self.serve(&mut subscriber).await;
        if let Err(e) = &result {
            error!(
                group = %self.group,
                topic = %self.topic_partition.topic,
                partition = self.topic_partition.partition,
                error = %e,
                "Partition consumer failed"
            );
        }
        self.terminate(subscriber).await;
        result
    }

    async fn serve(&mut self, subscriber: &mut JoinHandle<()>) -> Result<()> {
        loop {
            let deadline = self.next_tick;

            tokio::select! {
                maybe_command = self.commands.recv() => {
                    match maybe_command {
                        Some(command) => {
                            if let Flow::Stop = self.handle_command(command).await? {
                                return Ok(());
                            }
                        }
                        // every handle dropped
                        None => return Ok(()),
                    }
                }
                _ = tick_wait(deadline) => {
                    self.next_tick = None;
                    self.try_to_meet_demand().await?;
                }
                join = &mut *subscriber => {
                    return match join {
                        Err(e) if e.is_panic() => {
                            Err(Error::subscriber(format!("subscriber panicked: {}", e)))
                        }
                        _ => {
                            info!(
                                topic = %self.topic_partition.topic,
                                partition = self.topic_partition.partition,
                                "Subscriber exited, shutting down"
                            );
                            Ok(())
                        }
                    };
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Ask(demand) => {
                self.on_demand(demand).await?;
                Ok(Flow::Continue)
            }
            Command::TriggerCommit { strategy, offset } => {
                self.on_trigger_commit(strategy, offset).await?;
                Ok(Flow::Continue)
            }
            Command::Stop => Ok(Flow::Stop),
        }
    }

    /// Demand signal from the subscriber. The first positive signal triggers
    /// the initial offset load; fetching always happens on a tick, never
    /// inline.
    async fn on_demand(&mut self, demand: usize) -> Result<()> {
        if !self.tracker.is_loaded() {
            if demand == 0 {
                return Ok(());
            }
            let offset = self.load_initial_offset().await?;
            self.tracker.load(offset, Instant::now());
            info!(
                group = %self.group,
                topic = %self.topic_partition.topic,
                partition = self.topic_partition.partition,
                offset,
                "Loaded initial offset"
            );
            self.tracker.set_demand(demand);
            self.schedule_tick(TICK_AFTER_DEMAND);
            return Ok(());
        }

        self.tracker.set_demand(demand);
        if demand > 0 {
            self.schedule_tick(TICK_AFTER_DEMAND);
        }
        Ok(())
    }

    /// Resolve the starting offset: the group's committed offset, or the
    /// earliest retained offset when the broker has nothing for the group.
    async fn load_initial_offset(&self) -> Result<i64> {
        match self.worker.committed_offset(&self.group).await {
            Ok(Some(offset)) => Ok(offset),
            Ok(None) => self.worker.earliest_offset().await,
            Err(Error::UnknownTopicOrPartition { .. }) => self.worker.earliest_offset().await,
            Err(e) => Err(e),
        }
    }

    /// One tick: run a single fetch step while demand is outstanding.
    /// Duplicate ticks are harmless; demand is observed before acting.
    async fn try_to_meet_demand(&mut self) -> Result<()> {
        if self.tracker.demand() == 0 || !self.tracker.is_loaded() {
            return Ok(());
        }
        self.fetch_step().await?;
        if self.tracker.demand() > 0 {
            self.schedule_tick(TICK_AFTER_STEP);
        }
        Ok(())
    }

    async fn fetch_step(&mut self) -> Result<()> {
        let Some(offset) = self.tracker.current() else {
            return Ok(());
        };

        let batch = match self.worker.fetch(offset, &self.options.fetch).await {
            Ok(batch) => batch,
            Err(Error::OffsetOutOfRange { .. }) => {
                // recovered step yields zero records
                return self.reset_offsets(offset).await;
            }
            Err(e) if e.is_transient() => {
                warn!(
                    topic = %self.topic_partition.topic,
                    partition = self.topic_partition.partition,
                    offset,
                    error = %e,
                    "Transient fetch error, retrying on next tick"
                );
                metrics().fetch_errors.inc();
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        metrics().batches_fetched.inc();

        // An empty batch carries no progress: offsets stay put and the
        // step's commit policy downgrades to async so it can neither force
        // a sync commit nor rerun threshold math on unchanged offsets.
        let strategy = if batch.is_empty() {
            CommitStrategy::AsyncCommit
        } else {
            self.options.commit_strategy
        };

        if let Some(last) = batch.last() {
            self.tracker.advance(batch.len(), last.offset);
        }

        let count = batch.len();
        self.emit(batch).await?;
        if count > 0 {
            metrics().records_delivered.inc_by(count as u64);
            debug!(
                topic = %self.topic_partition.topic,
                partition = self.topic_partition.partition,
                count,
                next_offset = ?self.tracker.current(),
                remaining_demand = self.tracker.demand(),
                "Delivered batch"
            );
        }

        self.maybe_commit(strategy).await
    }

    async fn emit(&mut self, batch: RecordBatch) -> Result<()> {
        self.records
            .send(batch)
            .await
            .map_err(|_| Error::subscriber("record channel closed"))
    }

    /// Out-of-range recovery per the configured policy; fatal when the
    /// policy is `none`.
    async fn reset_offsets(&mut self, failed_offset: i64) -> Result<()> {
        let target = match self.options.auto_offset_reset {
            AutoOffsetReset::Earliest => self.worker.earliest_offset().await?,
            AutoOffsetReset::Latest => self.worker.latest_offset().await?,
            AutoOffsetReset::None => {
                error!(
                    topic = %self.topic_partition.topic,
                    partition = self.topic_partition.partition,
                    offset = failed_offset,
                    "Offset out of range and auto_offset_reset is none"
                );
                return Err(Error::OffsetOutOfRange {
                    topic: self.topic_partition.topic.clone(),
                    partition: self.topic_partition.partition,
                    offset: failed_offset,
                });
            }
        };

        warn!(
            topic = %self.topic_partition.topic,
            partition = self.topic_partition.partition,
            from = failed_offset,
            to = target,
            "Offset out of range, resetting"
        );
        self.tracker.reset(target);
        metrics().offset_resets.inc();
        Ok(())
    }

    async fn on_trigger_commit(&mut self, strategy: CommitStrategy, offset: i64) -> Result<()> {
        if !self.tracker.is_loaded() {
            debug!(offset, "Ignoring trigger_commit before initial offset load");
            return Ok(());
        }
        if self.tracker.mark_acked(offset) {
            debug!(offset, "Acked mark raised externally");
        }
        self.maybe_commit(strategy).await
    }

    async fn maybe_commit(&mut self, strategy: CommitStrategy) -> Result<()> {
        let now = Instant::now();
        match self.policy.decide(strategy, &self.tracker, now) {
            CommitDecision::Skip => Ok(()),
            CommitDecision::Touch => {
                self.tracker.touch(now);
                Ok(())
            }
            CommitDecision::Commit => {
                self.commit_acked().await;
                Ok(())
            }
        }
    }

    /// Flush the acked mark to the broker. Failures leave the committed
    /// mark unchanged; the next eligible tick retries.
    async fn commit_acked(&mut self) {
        let Some(acked) = self.tracker.acked() else {
            return;
        };
        match self.worker.commit(&self.group, acked).await {
            Ok(()) => {
                self.tracker.mark_committed(acked, Instant::now());
                metrics().commits.inc();
                debug!(
                    group = %self.group,
                    topic = %self.topic_partition.topic,
                    partition = self.topic_partition.partition,
                    offset = acked,
                    "Committed offset"
                );
            }
            Err(e) => {
                warn!(
                    group = %self.group,
                    topic = %self.topic_partition.topic,
                    partition = self.topic_partition.partition,
                    offset = acked,
                    error = %e,
                    "Offset commit failed"
                );
                metrics().commit_failures.inc();
            }
        }
    }

    /// Shutdown path for every exit: best-effort final commit, then the
    /// subscriber is unlinked. The broker worker drops with `self`.
    async fn terminate(&mut self, subscriber: JoinHandle<()>) {
        if self.tracker.dirty() {
            self.commit_acked().await;
        }
        subscriber.abort();
        info!(
            group = %self.group,
            topic = %self.topic_partition.topic,
            partition = self.topic_partition.partition,
            committed = ?self.tracker.committed(),
            "Partition consumer terminated"
        );
    }

    fn schedule_tick(&mut self, after: Duration) {
        let at = TokioInstant::now() + after;
        self.next_tick = Some(match self.next_tick {
            Some(existing) if existing <= at => existing,
            _ => at,
        });
    }
}

async fn tick_wait(deadline: Option<TokioInstant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
