//! Broker client capability for the siphon partition consumer.

pub mod client;
pub mod config;
pub mod kafka;

pub use client::{BrokerClient, FetchOptions};
pub use config::BrokerConfig;
pub use kafka::KafkaBroker;
