//! Offset bookkeeping for one partition consumer.
//!
//! Three marks move through a partition:
//! - `current`: the next offset to request from the broker
//! - `acked`: highest offset + 1 delivered downstream and eligible for commit
//! - `committed`: highest offset + 1 known durable at the broker
//!
//! `committed <= acked <= current` holds after every transition once the
//! tracker is loaded.

use std::time::{Duration, Instant};

/// The three offset marks, present once the initial load has happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offsets {
    pub current: i64,
    pub acked: i64,
    pub committed: i64,
}

/// Per-partition offset and demand state.
///
/// Pure data plus arithmetic; all broker interaction happens elsewhere.
#[derive(Debug)]
pub struct OffsetTracker {
    offsets: Option<Offsets>,
    last_commit_at: Option<Instant>,
    demand: usize,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self {
            offsets: None,
            last_commit_at: None,
            demand: 0,
        }
    }

    /// Whether the initial offset load has happened.
    pub fn is_loaded(&self) -> bool {
        self.offsets.is_some()
    }

    /// First load: all three marks start at `offset` and the commit timer
    /// starts now.
    pub fn load(&mut self, offset: i64, now: Instant) {
        self.reset(offset);
        self.last_commit_at = Some(now);
    }

    /// Collapse all three marks onto `offset`. Used after an
    /// offset-out-of-range recovery.
    pub fn reset(&mut self, offset: i64) {
        self.offsets = Some(Offsets {
            current: offset,
            acked: offset,
            committed: offset,
        });
        self.check_invariant();
    }

    /// A batch of `n` records ending at `last_offset` was taken from the
    /// broker: `current` and `acked` move past it and demand shrinks by the
    /// batch size, clamped at zero.
    pub fn advance(&mut self, n: usize, last_offset: i64) {
        if let Some(offsets) = self.offsets.as_mut() {
            offsets.current = last_offset + 1;
            offsets.acked = last_offset + 1;
        }
        self.demand = self.demand.saturating_sub(n);
        self.check_invariant();
    }

    /// Raise the acked mark to `offset`. Monotone: anything at or below the
    /// current mark is a no-op. Returns whether the mark moved.
    pub fn mark_acked(&mut self, offset: i64) -> bool {
        match self.offsets.as_mut() {
            Some(offsets) if offset > offsets.acked => {
                offsets.acked = offset;
                if offset > offsets.current {
                    offsets.current = offset;
                }
                self.check_invariant();
                true
            }
            _ => false,
        }
    }

    /// Record a successful broker commit.
    pub fn mark_committed(&mut self, offset: i64, now: Instant) {
        if let Some(offsets) = self.offsets.as_mut() {
            offsets.committed = offset;
        }
        self.last_commit_at = Some(now);
        self.check_invariant();
    }

    /// Restart the commit interval without a broker call.
    pub fn touch(&mut self, now: Instant) {
        self.last_commit_at = Some(now);
    }

    /// Acked progress not yet durable at the broker.
    pub fn pending(&self) -> i64 {
        match self.offsets {
            Some(o) => o.acked - o.committed,
            None => 0,
        }
    }

    /// Whether there is anything to commit.
    pub fn dirty(&self) -> bool {
        self.pending() > 0
    }

    pub fn offsets(&self) -> Option<Offsets> {
        self.offsets
    }

    pub fn current(&self) -> Option<i64> {
        self.offsets.map(|o| o.current)
    }

    pub fn acked(&self) -> Option<i64> {
        self.offsets.map(|o| o.acked)
    }

    pub fn committed(&self) -> Option<i64> {
        self.offsets.map(|o| o.committed)
    }

    pub fn demand(&self) -> usize {
        self.demand
    }

    pub fn set_demand(&mut self, demand: usize) {
        self.demand = demand;
    }

    /// Time since the last commit (or the first load), if any.
    pub fn since_last_commit(&self, now: Instant) -> Option<Duration> {
        self.last_commit_at.map(|at| now.saturating_duration_since(at))
    }

    pub fn last_commit_at(&self) -> Option<Instant> {
        self.last_commit_at
    }

    fn check_invariant(&self) {
        if let Some(o) = self.offsets {
            debug_assert!(
                o.committed <= o.acked && o.acked <= o.current,
                "offset invariant violated: {:?}",
                o
            );
        }
    }
}

impl Default for OffsetTracker {
    fn default() -> Self {
        Self::new()
    }
}
