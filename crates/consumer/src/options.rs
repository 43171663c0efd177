//! Partition consumer options.
//!
//! Precedence is explicit option > `SIPHON_*` environment variable > hard
//! default: construct (or deserialize) `ConsumerOptions`, then apply
//! `overlay_env` before handing them to the consumer.

use broker::FetchOptions;
use crate::policy::{AutoOffsetReset, CommitStrategy};
use serde::{Deserialize, Serialize};
use siphon_core::{Error, Result};
use std::time::Duration;

/// Options recognized by a partition consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerOptions {
    /// Async commit time bound, in milliseconds.
    #[serde(default = "default_commit_interval_ms")]
    pub commit_interval_ms: u64,
    /// Async commit progress bound, in records.
    #[serde(default = "default_commit_threshold")]
    pub commit_threshold: u64,
    /// Policy on offset-out-of-range.
    #[serde(default)]
    pub auto_offset_reset: AutoOffsetReset,
    /// When acked progress goes to the broker.
    #[serde(default)]
    pub commit_strategy: CommitStrategy,
    /// Fetch tuning passed to every broker fetch.
    #[serde(default)]
    pub fetch: FetchOptions,
    /// Capacity of the downstream record channel (the producer stage on the
    /// delivery edge).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_commit_interval_ms() -> u64 {
    5000
}

fn default_commit_threshold() -> u64 {
    100
}

fn default_channel_capacity() -> usize {
    16
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            commit_interval_ms: default_commit_interval_ms(),
            commit_threshold: default_commit_threshold(),
            auto_offset_reset: AutoOffsetReset::default(),
            commit_strategy: CommitStrategy::default(),
            fetch: FetchOptions::default(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl ConsumerOptions {
    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }

    /// Apply `SIPHON_*` environment overrides on top of these options.
    pub fn overlay_env(mut self) -> Result<Self> {
        if let Ok(v) = std::env::var("SIPHON_COMMIT_INTERVAL_MS") {
            self.commit_interval_ms = v
                .parse()
                .map_err(|_| Error::config(format!("bad SIPHON_COMMIT_INTERVAL_MS: {}", v)))?;
        }
        if let Ok(v) = std::env::var("SIPHON_COMMIT_THRESHOLD") {
            self.commit_threshold = v
                .parse()
                .map_err(|_| Error::config(format!("bad SIPHON_COMMIT_THRESHOLD: {}", v)))?;
        }
        if let Ok(v) = std::env::var("SIPHON_AUTO_OFFSET_RESET") {
            self.auto_offset_reset = v.parse().map_err(Error::Config)?;
        }
        if let Ok(v) = std::env::var("SIPHON_COMMIT_STRATEGY") {
            self.commit_strategy = v.parse().map_err(Error::Config)?;
        }
        Ok(self)
    }
}
