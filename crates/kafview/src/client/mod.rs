//!
//! # Broker client capability
//!
//! The retrieval core never speaks the broker protocol itself. It drives a
//! manually assigned consumer, a [`ConsumerClient`], produced once by a
//! [`ClientConnector`].
//!
mod memory;
#[cfg(feature = "kafka")]
mod kafka;

pub use memory::{MemoryBroker, MemoryConsumer};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConnector, KafkaConsumer};

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use crate::config::ClusterConfig;
use crate::types::{NodeId, Offset, PartitionId, TopicName, TopicPartition};
use crate::Result;

/// Establishes the consumer connection
#[async_trait]
pub trait ClientConnector: Send + Sync {
    type Client: ConsumerClient;

    async fn connect(&self, config: &ClusterConfig) -> Result<Self::Client>;
}

/// A consumer with manual partition assignment
///
/// Assignment and positions are client-side state, so implementations take
/// `&mut self` for anything that can change them, including `poll`.
#[async_trait]
pub trait ConsumerClient: Send {
    async fn list_topics(&mut self) -> Result<Vec<TopicName>>;

    /// Partition layout of a topic. Unknown topics yield an empty list.
    async fn partitions_for(&mut self, topic: &str) -> Result<Vec<PartitionMetadata>>;

    /// Replace the current assignment
    async fn assign(&mut self, partitions: &[TopicPartition]) -> Result<()>;

    fn assignment(&self) -> Vec<TopicPartition>;

    async fn seek(&mut self, partition: &TopicPartition, offset: Offset) -> Result<()>;

    async fn seek_to_beginning(&mut self, partitions: &[TopicPartition]) -> Result<()>;

    async fn seek_to_end(&mut self, partitions: &[TopicPartition]) -> Result<()>;

    /// Offset of the next record `poll` will return for the partition
    async fn position(&mut self, partition: &TopicPartition) -> Result<Offset>;

    /// High watermark of each partition
    async fn end_offsets(
        &mut self,
        partitions: &[TopicPartition],
    ) -> Result<BTreeMap<TopicPartition, Offset>>;

    /// Wait at most `timeout` for records on the assigned partitions
    async fn poll(&mut self, timeout: Duration) -> Result<PolledRecords>;
}

/// Partition layout as reported by the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub id: PartitionId,
    pub leader: Option<NodeId>,
    pub replicas: Vec<NodeId>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampType {
    #[default]
    NoTimestamp,
    CreateTime,
    LogAppendTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordHeader {
    pub key: String,
    #[serde(serialize_with = "lossy_utf8")]
    pub value: Option<Vec<u8>>,
}

impl RecordHeader {
    pub fn new(key: impl Into<String>, value: Option<&[u8]>) -> Self {
        Self {
            key: key.into(),
            value: value.map(<[u8]>::to_vec),
        }
    }
}

fn lossy_utf8<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(bytes) => serializer.serialize_some(&String::from_utf8_lossy(bytes)),
        None => serializer.serialize_none(),
    }
}

/// A record as handed back by the client, value still raw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    pub topic: TopicName,
    pub partition: PartitionId,
    pub offset: Offset,
    pub timestamp: i64,
    pub timestamp_type: TimestampType,
    /// log-append adjustment applied by the broker
    pub timestamp_delta: i64,
    /// `-1` when there is no key
    pub serialized_key_size: i32,
    /// `-1` when there is no value
    pub serialized_value_size: i32,
    pub key: Option<String>,
    pub value: Option<Vec<u8>>,
    pub headers: Vec<RecordHeader>,
    pub leader_epoch: Option<i32>,
}

impl BrokerRecord {
    pub fn key_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

/// Result of one poll, grouped by partition
#[derive(Debug, Default)]
pub struct PolledRecords {
    records: BTreeMap<TopicPartition, Vec<BrokerRecord>>,
}

impl PolledRecords {
    pub fn push(&mut self, record: BrokerRecord) {
        self.records
            .entry(record.key_partition())
            .or_default()
            .push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.values().all(Vec::is_empty)
    }

    pub fn count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn partitions(&self) -> impl Iterator<Item = &TopicPartition> {
        self.records.keys()
    }

    pub fn records(&self, partition: &TopicPartition) -> &[BrokerRecord] {
        self.records
            .get(partition)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Remove and return the records of one partition
    pub fn take(&mut self, partition: &TopicPartition) -> Vec<BrokerRecord> {
        self.records.remove(partition).unwrap_or_default()
    }
}

impl IntoIterator for PolledRecords {
    type Item = (TopicPartition, Vec<BrokerRecord>);
    type IntoIter = std::collections::btree_map::IntoIter<TopicPartition, Vec<BrokerRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl FromIterator<BrokerRecord> for PolledRecords {
    fn from_iter<I: IntoIterator<Item = BrokerRecord>>(iter: I) -> Self {
        let mut polled = Self::default();
        for record in iter {
            polled.push(record);
        }
        polled
    }
}
