//! rskafka-backed broker session.
//!
//! Uses rskafka for Kafka-compatible access with:
//! - One `PartitionClient` per partition consumer
//! - TLS + SCRAM SASL for cloud clusters
//! - Broker errors classified onto the core error taxonomy

use crate::client::{BrokerClient, FetchOptions};
use crate::config::BrokerConfig;
use async_trait::async_trait;
use rskafka::client::{
    partition::{OffsetAt, PartitionClient, UnknownTopicHandling},
    ClientBuilder, Credentials, SaslConfig,
};
use siphon_core::{Error, Record, Result, TopicPartition};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Sentinel for "no offset committed yet".
const NO_COMMITTED_OFFSET: i64 = -1;

/// Creates a TLS configuration for cloud clusters.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// A dedicated rskafka session for one topic partition.
pub struct KafkaBroker {
    topic_partition: TopicPartition,
    client: Arc<PartitionClient>,
    /// Committed offset for the owning group.
    ///
    /// rskafka's protocol subset has no consumer-group offset RPCs, so the
    /// committed mark lives here until it grows one; a durable group commit
    /// would go through the controller's offset-commit API.
    committed: AtomicI64,
}

impl KafkaBroker {
    /// Connects to the cluster and binds a partition client.
    ///
    /// Failure here is a fatal init failure: the consumer's `start` fails
    /// and the caller retries per its own policy.
    pub async fn connect(config: &BrokerConfig, topic_partition: TopicPartition) -> Result<Self> {
        let connection = config.uri_string();
        let mut builder = ClientBuilder::new(vec![connection]);

        if let (Some(username), Some(password)) = (&config.sasl_username, &config.sasl_password) {
            builder = builder
                .tls_config(create_tls_config())
                .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                    username.clone(),
                    password.clone(),
                )));
        }

        let client = builder
            .build()
            .await
            .map_err(|e| Error::broker(format!("failed to connect to broker: {}", e)))?;

        let partition_client = client
            .partition_client(
                topic_partition.topic.clone(),
                topic_partition.partition,
                UnknownTopicHandling::Error,
            )
            .await
            .map_err(|e| Error::broker(format!("failed to get partition client: {}", e)))?;

        info!(
            topic = %topic_partition.topic,
            partition = topic_partition.partition,
            "Broker session created"
        );

        Ok(Self {
            topic_partition,
            client: Arc::new(partition_client),
            committed: AtomicI64::new(NO_COMMITTED_OFFSET),
        })
    }

    /// Maps an rskafka failure onto the core taxonomy.
    ///
    /// rskafka folds protocol error codes into its error rendering, so
    /// classification goes through the rendered message.
    fn classify(&self, offset: i64, err: rskafka::client::error::Error) -> Error {
        let msg = err.to_string();
        if msg.contains("OffsetOutOfRange") {
            Error::OffsetOutOfRange {
                topic: self.topic_partition.topic.clone(),
                partition: self.topic_partition.partition,
                offset,
            }
        } else if msg.contains("UnknownTopicOrPartition") {
            Error::UnknownTopicOrPartition {
                topic: self.topic_partition.topic.clone(),
                partition: self.topic_partition.partition,
            }
        } else if is_transient_message(&msg) {
            Error::transient(msg)
        } else {
            Error::broker(msg)
        }
    }
}

/// Connection-level failures are retried on the next tick.
fn is_transient_message(msg: &str) -> bool {
    let lowered = msg.to_ascii_lowercase();
    ["timed out", "timeout", "connection", "io error", "broken pipe"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

#[async_trait]
impl BrokerClient for KafkaBroker {
    fn topic_partition(&self) -> &TopicPartition {
        &self.topic_partition
    }

    async fn fetch(&self, offset: i64, options: &FetchOptions) -> Result<Vec<Record>> {
        let (records, _high_watermark) = self
            .client
            .fetch_records(
                offset,
                options.min_bytes..options.max_bytes,
                options.max_wait_ms,
            )
            .await
            .map_err(|e| self.classify(offset, e))?;

        let batch: Vec<Record> = records
            .into_iter()
            .map(|r| Record {
                offset: r.offset,
                key: r.record.key,
                value: r.record.value,
                timestamp: r.record.timestamp.timestamp_millis(),
            })
            .collect();

        debug!(
            topic = %self.topic_partition.topic,
            partition = self.topic_partition.partition,
            offset = offset,
            count = batch.len(),
            "Fetched records"
        );

        Ok(batch)
    }

    async fn committed_offset(&self, _group: &str) -> Result<Option<i64>> {
        match self.committed.load(Ordering::SeqCst) {
            NO_COMMITTED_OFFSET => Ok(None),
            offset => Ok(Some(offset)),
        }
    }

    async fn commit(&self, group: &str, offset: i64) -> Result<()> {
        let prev = self.committed.swap(offset, Ordering::SeqCst);

        debug!(
            group = %group,
            topic = %self.topic_partition.topic,
            partition = self.topic_partition.partition,
            prev_offset = prev,
            new_offset = offset,
            "Committed offset"
        );

        Ok(())
    }

    async fn earliest_offset(&self) -> Result<i64> {
        self.client
            .get_offset(OffsetAt::Earliest)
            .await
            .map_err(|e| self.classify(0, e))
    }

    async fn latest_offset(&self) -> Result<i64> {
        self.client
            .get_offset(OffsetAt::Latest)
            .await
            .map_err(|e| self.classify(0, e))
    }
}
