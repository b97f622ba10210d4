use std::io::Error as IoError;

use crate::config::ConfigError;
use crate::types::{Offset, TopicPartition};

pub type Result<T, E = InspectError> = core::result::Result<T, E>;

/// Possible errors that may arise while inspecting a cluster
#[derive(thiserror::Error, Debug)]
pub enum InspectError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to connect to cluster at {bootstrap}: {reason}")]
    Connect { bootstrap: String, reason: String },
    #[error("Partition not assigned to consumer: {0}")]
    PartitionNotAssigned(TopicPartition),
    #[error("Partition not found: {0}")]
    PartitionNotFound(TopicPartition),
    #[error("Attempted to fetch from negative offset: {0}")]
    NegativeOffset(Offset),
    #[error("Unsupported message format: {0}")]
    UnsupportedFormat(String),
    #[cfg(feature = "kafka")]
    #[error("Kafka client error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("Broker client error: {0}")]
    Client(String),
}
