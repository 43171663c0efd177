//! Core types and errors for the siphon partition consumer.

pub mod error;
pub mod record;

pub use error::{Error, Result};
pub use record::{Record, TopicPartition};
