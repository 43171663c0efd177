//! Internal telemetry for siphon.
//!
//! Structured logging via tracing plus a small set of in-process counters
//! the runner logs periodically.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;
