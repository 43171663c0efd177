//! Siphon single-partition runner.
//!
//! Binds one demand-driven partition consumer to a configured
//! `(group, topic, partition)` and drains it with a logging subscriber that
//! asks in fixed-size windows. Group coordination and partition assignment
//! live outside this binary.

use anyhow::{Context, Result};
use broker::BrokerConfig;
use consumer::{ConsumerOptions, PartitionConsumer};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

use telemetry::{init_tracing_from_env, metrics};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    /// Consumer group name
    #[serde(default = "default_group")]
    group: String,
    /// Topic to consume from
    #[serde(default = "default_topic")]
    topic: String,
    /// Partition to consume
    #[serde(default)]
    partition: i32,
    /// Records requested per demand window
    #[serde(default = "default_window")]
    window: usize,

    #[serde(default)]
    broker: BrokerConfig,

    #[serde(default)]
    consumer: ConsumerOptions,
}

fn default_group() -> String {
    "siphon".to_string()
}

fn default_topic() -> String {
    "events".to_string()
}

fn default_window() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group: default_group(),
            topic: default_topic(),
            partition: 0,
            window: default_window(),
            broker: BrokerConfig::default(),
            consumer: ConsumerOptions::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider BEFORE any TLS operations
    // rustls 0.23+ requires explicit crypto provider selection
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting siphon v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        group = %config.group,
        topic = %config.topic,
        partition = config.partition,
        brokers = ?config.broker.uris,
        "Loaded configuration"
    );

    let options = config.consumer.clone().overlay_env()?;

    let window = config.window.max(1);
    let subscriber = consumer::subscriber(move |handle, topic_partition, mut records| async move {
        let mut outstanding = 0usize;
        loop {
            if outstanding == 0 {
                if handle.ask(window).await.is_err() {
                    break;
                }
                outstanding = window;
            }
            match records.recv().await {
                Some(batch) if batch.is_empty() => continue,
                Some(batch) => {
                    outstanding = outstanding.saturating_sub(batch.len());
                    info!(
                        partition = %topic_partition,
                        count = batch.len(),
                        first_offset = batch[0].offset,
                        last_offset = batch[batch.len() - 1].offset,
                        "Received records"
                    );
                }
                None => break,
            }
        }
    });

    let (handle, mut join) = PartitionConsumer::start(
        config.group.clone(),
        config.topic.clone(),
        config.partition,
        subscriber,
        &config.broker,
        options,
    )
    .await
    .context("Failed to start partition consumer")?;

    // Periodic metrics snapshot
    let _metrics_task = tokio::spawn(async {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = metrics().snapshot();
            info!(
                records_delivered = snapshot.records_delivered,
                commits = snapshot.commits,
                commit_failures = snapshot.commit_failures,
                fetch_errors = snapshot.fetch_errors,
                "Consumer metrics"
            );
        }
    });

    tokio::select! {
        result = &mut join => {
            report(result);
        }
        _ = shutdown_signal() => {
            info!("Shutting down...");
            let _ = handle.stop().await;
            report(join.await);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn report(result: std::result::Result<siphon_core::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => info!("Partition consumer finished"),
        Ok(Err(e)) => error!("Partition consumer failed: {}", e),
        Err(e) => error!("Partition consumer task panicked: {}", e),
    }
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("SIPHON")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides for nested broker config from environment
    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(uris) = std::env::var("SIPHON_BROKER_URIS") {
        config.broker.uris = uris.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(username) = std::env::var("SIPHON_BROKER_SASL_USERNAME") {
        config.broker.sasl_username = Some(username);
    }
    if let Ok(password) = std::env::var("SIPHON_BROKER_SASL_PASSWORD") {
        config.broker.sasl_password = Some(password);
    }
    if let Ok(group) = std::env::var("SIPHON_GROUP") {
        config.group = group;
    }
    if let Ok(topic) = std::env::var("SIPHON_TOPIC") {
        config.topic = topic;
    }
    if let Ok(partition) = std::env::var("SIPHON_PARTITION") {
        config.partition = partition
            .parse()
            .context("SIPHON_PARTITION must be an integer")?;
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
