//! Commit strategy and the decision of when acked progress goes to the broker.

use crate::tracker::OffsetTracker;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::{Duration, Instant};

/// How acked progress is flushed to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStrategy {
    /// Never commit; the caller drives commits via `trigger_commit`.
    None,
    /// Commit on every opportunity with pending progress.
    SyncCommit,
    /// Commit when pending progress crosses the threshold or the interval
    /// elapses.
    AsyncCommit,
}

impl Default for CommitStrategy {
    fn default() -> Self {
        Self::AsyncCommit
    }
}

impl FromStr for CommitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "sync_commit" => Ok(Self::SyncCommit),
            "async_commit" => Ok(Self::AsyncCommit),
            other => Err(format!("unknown commit strategy: {}", other)),
        }
    }
}

/// What to do when a fetch lands outside the broker's retained range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoOffsetReset {
    /// Out-of-range is fatal.
    None,
    /// Restart from the earliest retained offset.
    Earliest,
    /// Restart from the latest offset.
    Latest,
}

impl Default for AutoOffsetReset {
    fn default() -> Self {
        Self::None
    }
}

impl FromStr for AutoOffsetReset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            other => Err(format!("unknown offset reset policy: {}", other)),
        }
    }
}

/// Outcome of one commit-policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    /// Nothing to do.
    Skip,
    /// No pending progress; restart the interval timer without a broker call.
    Touch,
    /// Flush acked progress to the broker.
    Commit,
}

/// Configured commit bounds. The strategy is passed per evaluation because
/// individual steps can run under a different strategy than the configured
/// one (empty batches downgrade to async, `trigger_commit` carries its own).
#[derive(Debug, Clone)]
pub struct CommitPolicy {
    pub interval: Duration,
    pub threshold: u64,
}

impl CommitPolicy {
    pub fn new(interval: Duration, threshold: u64) -> Self {
        Self {
            interval,
            threshold,
        }
    }

    /// Decide whether acked progress should be flushed now.
    ///
    /// A commit is only ever decided when `acked > committed`, which keeps
    /// broker commits idempotent in that relation.
    pub fn decide(
        &self,
        strategy: CommitStrategy,
        tracker: &OffsetTracker,
        now: Instant,
    ) -> CommitDecision {
        match strategy {
            CommitStrategy::None => CommitDecision::Skip,
            CommitStrategy::SyncCommit => {
                if tracker.dirty() {
                    CommitDecision::Commit
                } else {
                    CommitDecision::Skip
                }
            }
            CommitStrategy::AsyncCommit => {
                if !tracker.dirty() {
                    return CommitDecision::Touch;
                }
                if tracker.pending() >= self.threshold as i64 {
                    return CommitDecision::Commit;
                }
                match tracker.since_last_commit(now) {
                    Some(elapsed) if elapsed >= self.interval => CommitDecision::Commit,
                    _ => CommitDecision::Skip,
                }
            }
        }
    }
}
