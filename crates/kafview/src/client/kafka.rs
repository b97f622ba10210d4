//!
//! # librdkafka backend
//!
//! A [`BaseConsumer`] driven through manual assignment. Positions are
//! tracked locally and pushed to librdkafka by re-assigning, which keeps
//! seeks valid before the first fetch. Every call that can block on the
//! network runs on the blocking thread pool.
//!
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blocking::unblock;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::{Offset as KafkaOffset, Timestamp, TopicPartitionList};
use tracing::{debug, instrument, trace};

use crate::config::ClusterConfig;
use crate::types::{Offset, TopicName, TopicPartition};
use crate::{InspectError, Result};

use super::{
    BrokerRecord, ClientConnector, ConsumerClient, PartitionMetadata, PolledRecords, RecordHeader,
    TimestampType,
};

/// Connects a [`KafkaConsumer`] using the cluster's client properties
#[derive(Debug, Default, Clone)]
pub struct KafkaConnector;

#[async_trait]
impl ClientConnector for KafkaConnector {
    type Client = KafkaConsumer;

    #[instrument(skip(self, config), fields(bootstrap = %config.bootstrap))]
    async fn connect(&self, config: &ClusterConfig) -> Result<KafkaConsumer> {
        let connect_error = |err: KafkaError| InspectError::Connect {
            bootstrap: config.bootstrap.clone(),
            reason: err.to_string(),
        };

        let mut client_config = ClientConfig::new();
        for (key, value) in config.client_properties() {
            client_config.set(key, value);
        }
        let consumer: BaseConsumer = client_config.create().map_err(connect_error)?;
        let consumer = Arc::new(consumer);

        // librdkafka connects lazily, a metadata round trip surfaces
        // unreachable brokers and rejected credentials now
        let client = consumer.clone();
        let timeout = config.fetch.request_timeout;
        let brokers = unblock(move || {
            client
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(connect_error)?;
        debug!(brokers, "metadata request succeeded");

        Ok(KafkaConsumer {
            consumer,
            assigned: vec![],
            positions: BTreeMap::new(),
            max_poll_records: config.fetch.max_poll_records.max(1),
            request_timeout: timeout,
        })
    }
}

/// Manually assigned librdkafka consumer
pub struct KafkaConsumer {
    consumer: Arc<BaseConsumer>,
    assigned: Vec<TopicPartition>,
    /// positions set by a seek or advanced by a poll
    positions: BTreeMap<TopicPartition, Offset>,
    max_poll_records: usize,
    request_timeout: Duration,
}

impl fmt::Debug for KafkaConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaConsumer")
            .field("assigned", &self.assigned)
            .field("positions", &self.positions)
            .finish()
    }
}

/// Which end of a partition's retained log to seek to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Watermark {
    Low,
    High,
}

impl Watermark {
    fn select(self, (low, high): (Offset, Offset)) -> Offset {
        match self {
            Self::Low => low,
            Self::High => high,
        }
    }
}

impl KafkaConsumer {
    fn ensure_assigned(&self, partition: &TopicPartition) -> Result<()> {
        if self.assigned.contains(partition) {
            Ok(())
        } else {
            Err(InspectError::PartitionNotAssigned(partition.clone()))
        }
    }

    /// Push the assignment with the locally tracked positions
    fn apply_assignment(&self) -> Result<()> {
        let mut list = TopicPartitionList::new();
        for partition in &self.assigned {
            let offset = match self.positions.get(partition) {
                Some(offset) => KafkaOffset::Offset(*offset),
                None => KafkaOffset::Beginning,
            };
            list.add_partition_offset(&partition.topic, partition.partition, offset)?;
        }
        self.consumer.assign(&list)?;
        Ok(())
    }

    /// Low and high watermark of each partition
    async fn watermarks(&self, partitions: &[TopicPartition]) -> Result<Vec<(Offset, Offset)>> {
        let consumer = self.consumer.clone();
        let partitions = partitions.to_vec();
        let timeout = self.request_timeout;
        let watermarks = unblock(move || {
            partitions
                .iter()
                .map(|p| consumer.fetch_watermarks(&p.topic, p.partition, timeout))
                .collect::<KafkaResult<Vec<_>>>()
        })
        .await?;
        Ok(watermarks)
    }

    async fn seek_all(&mut self, partitions: &[TopicPartition], to: Watermark) -> Result<()> {
        for partition in partitions {
            self.ensure_assigned(partition)?;
        }
        let watermarks = self.watermarks(partitions).await?;
        for (partition, watermarks) in partitions.iter().zip(watermarks) {
            self.positions.insert(partition.clone(), to.select(watermarks));
        }
        self.apply_assignment()
    }
}

#[async_trait]
impl ConsumerClient for KafkaConsumer {
    async fn list_topics(&mut self) -> Result<Vec<TopicName>> {
        let consumer = self.consumer.clone();
        let timeout = self.request_timeout;
        let mut topics = unblock(move || {
            consumer.fetch_metadata(None, timeout).map(|metadata| {
                metadata
                    .topics()
                    .iter()
                    .map(|topic| topic.name().to_owned())
                    .collect::<Vec<_>>()
            })
        })
        .await?;
        topics.sort();
        Ok(topics)
    }

    async fn partitions_for(&mut self, topic: &str) -> Result<Vec<PartitionMetadata>> {
        let consumer = self.consumer.clone();
        let name = topic.to_owned();
        let timeout = self.request_timeout;
        let partitions = unblock(move || {
            consumer.fetch_metadata(Some(name.as_str()), timeout).map(|metadata| {
                metadata
                    .topics()
                    .iter()
                    .filter(|topic| topic.name() == name)
                    .flat_map(|topic| topic.partitions())
                    .map(|partition| PartitionMetadata {
                        id: partition.id(),
                        leader: (partition.leader() >= 0).then(|| partition.leader()),
                        replicas: partition.replicas().to_vec(),
                    })
                    .collect::<Vec<_>>()
            })
        })
        .await?;
        trace!(topic, partitions = partitions.len(), "partition metadata");
        Ok(partitions)
    }

    async fn assign(&mut self, partitions: &[TopicPartition]) -> Result<()> {
        self.assigned = partitions.to_vec();
        self.positions.clear();
        self.apply_assignment()
    }

    fn assignment(&self) -> Vec<TopicPartition> {
        self.assigned.clone()
    }

    async fn seek(&mut self, partition: &TopicPartition, offset: Offset) -> Result<()> {
        self.ensure_assigned(partition)?;
        self.positions.insert(partition.clone(), offset);
        self.apply_assignment()
    }

    async fn seek_to_beginning(&mut self, partitions: &[TopicPartition]) -> Result<()> {
        self.seek_all(partitions, Watermark::Low).await
    }

    async fn seek_to_end(&mut self, partitions: &[TopicPartition]) -> Result<()> {
        self.seek_all(partitions, Watermark::High).await
    }

    async fn position(&mut self, partition: &TopicPartition) -> Result<Offset> {
        self.ensure_assigned(partition)?;
        let watermarks = self.watermarks(std::slice::from_ref(partition)).await?;
        let low = watermarks.first().map(|(low, _)| *low).unwrap_or_default();
        let position = match self.positions.get(partition) {
            Some(offset) if *offset >= low => *offset,
            _ => low,
        };
        self.positions.insert(partition.clone(), position);
        Ok(position)
    }

    async fn end_offsets(
        &mut self,
        partitions: &[TopicPartition],
    ) -> Result<BTreeMap<TopicPartition, Offset>> {
        let watermarks = self.watermarks(partitions).await?;
        Ok(partitions
            .iter()
            .cloned()
            .zip(watermarks.into_iter().map(|(_, high)| high))
            .collect())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<PolledRecords> {
        let consumer = self.consumer.clone();
        let max = self.max_poll_records;
        let records = unblock(move || -> KafkaResult<Vec<BrokerRecord>> {
            let mut records = vec![];
            let mut wait = timeout;
            while records.len() < max {
                match consumer.poll(wait) {
                    Some(message) => records.push(broker_record(&message?)),
                    None => break,
                }
                wait = Duration::ZERO;
            }
            Ok(records)
        })
        .await?;

        for record in &records {
            self.positions.insert(record.key_partition(), record.offset + 1);
        }
        trace!(count = records.len(), "kafka poll");
        Ok(records.into_iter().collect())
    }
}

fn broker_record(message: &BorrowedMessage<'_>) -> BrokerRecord {
    let (timestamp_type, timestamp) = match message.timestamp() {
        Timestamp::NotAvailable => (TimestampType::NoTimestamp, -1),
        Timestamp::CreateTime(millis) => (TimestampType::CreateTime, millis),
        Timestamp::LogAppendTime(millis) => (TimestampType::LogAppendTime, millis),
    };
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| RecordHeader::new(header.key, header.value))
                .collect()
        })
        .unwrap_or_default();

    BrokerRecord {
        topic: message.topic().to_owned(),
        partition: message.partition(),
        offset: message.offset(),
        timestamp,
        timestamp_type,
        timestamp_delta: 0,
        serialized_key_size: message.key().map_or(-1, |key| key.len() as i32),
        serialized_value_size: message.payload().map_or(-1, |value| value.len() as i32),
        key: message
            .key()
            .map(|key| String::from_utf8_lossy(key).into_owned()),
        value: message.payload().map(<[u8]>::to_vec),
        headers,
        leader_epoch: None,
    }
}
