//!
//! # In-process broker
//!
//! Holds topics in memory and hands out consumers that behave like a
//! manually assigned consumer with `auto.offset.reset=earliest`.
//!
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_lock::RwLock;
use async_trait::async_trait;
use fluvio_future::timer::sleep;
use tracing::{debug, trace};

use crate::config::ClusterConfig;
use crate::types::{NodeId, Offset, PartitionId, TopicName, TopicPartition};
use crate::{InspectError, Result};

use super::{
    BrokerRecord, ClientConnector, ConsumerClient, PartitionMetadata, PolledRecords, RecordHeader,
    TimestampType,
};

const DEFAULT_MAX_POLL_RECORDS: usize = 100;

#[derive(Debug, Default)]
struct PartitionLog {
    leader: Option<NodeId>,
    replicas: Vec<NodeId>,
    /// first retained offset
    log_start: Offset,
    /// every record ever written, indexed by offset
    records: Vec<BrokerRecord>,
}

impl PartitionLog {
    fn high_watermark(&self) -> Offset {
        self.records.len() as Offset
    }

    fn retained(&self, from: Offset) -> &[BrokerRecord] {
        let from = from.max(self.log_start).min(self.high_watermark());
        &self.records[from as usize..]
    }
}

#[derive(Debug)]
struct BrokerState {
    topics: BTreeMap<TopicName, Vec<PartitionLog>>,
    max_poll_records: usize,
    empty_polls: usize,
    poll_latency: Duration,
    connect_failure: Option<String>,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            topics: BTreeMap::new(),
            max_poll_records: DEFAULT_MAX_POLL_RECORDS,
            empty_polls: 0,
            poll_latency: Duration::ZERO,
            connect_failure: None,
        }
    }
}

impl BrokerState {
    fn partition(&self, key: &TopicPartition) -> Result<&PartitionLog> {
        usize::try_from(key.partition)
            .ok()
            .and_then(|idx| self.topics.get(&key.topic)?.get(idx))
            .ok_or_else(|| InspectError::PartitionNotFound(key.clone()))
    }

    fn partition_mut(&mut self, key: &TopicPartition) -> Result<&mut PartitionLog> {
        usize::try_from(key.partition)
            .ok()
            .and_then(|idx| self.topics.get_mut(&key.topic)?.get_mut(idx))
            .ok_or_else(|| InspectError::PartitionNotFound(key.clone()))
    }
}

#[derive(Debug, Default)]
struct BrokerStats {
    connects: AtomicUsize,
    polls: AtomicUsize,
}

/// In-memory cluster, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<RwLock<BrokerState>>,
    stats: Arc<BrokerStats>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a topic whose partition `n` is led by node `n`, with no followers
    pub async fn create_topic(&self, topic: impl Into<TopicName>, partitions: PartitionId) {
        let layout = (0..partitions).map(|id| (Some(id), vec![id])).collect();
        self.create_topic_with_layout(topic, layout).await;
    }

    /// Create a topic from `(leader, replicas)` per partition, in partition order
    pub async fn create_topic_with_layout(
        &self,
        topic: impl Into<TopicName>,
        layout: Vec<(Option<NodeId>, Vec<NodeId>)>,
    ) {
        let partitions = layout
            .into_iter()
            .map(|(leader, replicas)| PartitionLog {
                leader,
                replicas,
                ..Default::default()
            })
            .collect();
        self.state.write().await.topics.insert(topic.into(), partitions);
    }

    /// Append a record, returning its offset
    pub async fn produce(
        &self,
        topic: &str,
        partition: PartitionId,
        key: Option<&str>,
        value: Option<&[u8]>,
    ) -> Result<Offset> {
        self.produce_with_headers(topic, partition, key, value, vec![])
            .await
    }

    pub async fn produce_with_headers(
        &self,
        topic: &str,
        partition: PartitionId,
        key: Option<&str>,
        value: Option<&[u8]>,
        headers: Vec<RecordHeader>,
    ) -> Result<Offset> {
        let key_partition = TopicPartition::new(topic, partition);
        let mut state = self.state.write().await;
        let log = state.partition_mut(&key_partition)?;
        let offset = log.high_watermark();
        log.records.push(BrokerRecord {
            topic: topic.to_owned(),
            partition,
            offset,
            timestamp: now_millis(),
            timestamp_type: TimestampType::CreateTime,
            timestamp_delta: 0,
            serialized_key_size: key.map_or(-1, |k| k.len() as i32),
            serialized_value_size: value.map_or(-1, |v| v.len() as i32),
            key: key.map(str::to_owned),
            value: value.map(<[u8]>::to_vec),
            headers,
            leader_epoch: Some(0),
        });
        Ok(offset)
    }

    /// Drop records below `offset`, as retention would
    pub async fn truncate_before(
        &self,
        topic: &str,
        partition: PartitionId,
        offset: Offset,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let log = state.partition_mut(&TopicPartition::new(topic, partition))?;
        log.log_start = offset.clamp(log.log_start, log.high_watermark());
        Ok(())
    }

    /// Cap the number of records a single poll returns
    pub async fn set_max_poll_records(&self, max: usize) {
        self.state.write().await.max_poll_records = max.max(1);
    }

    /// Make the next `count` polls come back empty, like a slow broker
    pub async fn delay_polls(&self, count: usize) {
        self.state.write().await.empty_polls = count;
    }

    /// Make every poll wait `latency` before answering
    pub async fn set_poll_latency(&self, latency: Duration) {
        self.state.write().await.poll_latency = latency;
    }

    /// Reject connection attempts with `reason` until cleared with `None`
    pub async fn fail_connections(&self, reason: Option<&str>) {
        self.state.write().await.connect_failure = reason.map(str::to_owned);
    }

    pub fn connect_count(&self) -> usize {
        self.stats.connects.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.stats.polls.load(Ordering::SeqCst)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[async_trait]
impl ClientConnector for MemoryBroker {
    type Client = MemoryConsumer;

    async fn connect(&self, config: &ClusterConfig) -> Result<MemoryConsumer> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.state.read().await.connect_failure {
            return Err(InspectError::Connect {
                bootstrap: config.bootstrap.clone(),
                reason: reason.clone(),
            });
        }

        debug!(client_id = %config.client_id, "memory consumer connected");
        Ok(MemoryConsumer {
            broker: self.clone(),
            assignment: vec![],
            positions: BTreeMap::new(),
        })
    }
}

/// Consumer handed out by [`MemoryBroker`]
#[derive(Debug)]
pub struct MemoryConsumer {
    broker: MemoryBroker,
    assignment: Vec<TopicPartition>,
    /// positions explicitly set by a seek or advanced by a poll
    positions: BTreeMap<TopicPartition, Offset>,
}

impl MemoryConsumer {
    fn ensure_assigned(&self, partition: &TopicPartition) -> Result<()> {
        if self.assignment.contains(partition) {
            Ok(())
        } else {
            Err(InspectError::PartitionNotAssigned(partition.clone()))
        }
    }
}

#[async_trait]
impl ConsumerClient for MemoryConsumer {
    async fn list_topics(&mut self) -> Result<Vec<TopicName>> {
        let state = self.broker.state.read().await;
        Ok(state.topics.keys().cloned().collect())
    }

    async fn partitions_for(&mut self, topic: &str) -> Result<Vec<PartitionMetadata>> {
        let state = self.broker.state.read().await;
        let Some(partitions) = state.topics.get(topic) else {
            return Ok(vec![]);
        };

        Ok(partitions
            .iter()
            .enumerate()
            .map(|(id, log)| PartitionMetadata {
                id: id as PartitionId,
                leader: log.leader,
                replicas: log.replicas.clone(),
            })
            .collect())
    }

    async fn assign(&mut self, partitions: &[TopicPartition]) -> Result<()> {
        self.assignment = partitions.to_vec();
        self.positions.clear();
        Ok(())
    }

    fn assignment(&self) -> Vec<TopicPartition> {
        self.assignment.clone()
    }

    async fn seek(&mut self, partition: &TopicPartition, offset: Offset) -> Result<()> {
        self.ensure_assigned(partition)?;
        self.positions.insert(partition.clone(), offset);
        Ok(())
    }

    async fn seek_to_beginning(&mut self, partitions: &[TopicPartition]) -> Result<()> {
        let state = self.broker.state.read().await;
        for partition in partitions {
            self.ensure_assigned(partition)?;
            let start = state.partition(partition)?.log_start;
            self.positions.insert(partition.clone(), start);
        }
        Ok(())
    }

    async fn seek_to_end(&mut self, partitions: &[TopicPartition]) -> Result<()> {
        let state = self.broker.state.read().await;
        for partition in partitions {
            self.ensure_assigned(partition)?;
            let end = state.partition(partition)?.high_watermark();
            self.positions.insert(partition.clone(), end);
        }
        Ok(())
    }

    async fn position(&mut self, partition: &TopicPartition) -> Result<Offset> {
        self.ensure_assigned(partition)?;
        let state = self.broker.state.read().await;
        let log = state.partition(partition)?;
        let position = match self.positions.get(partition) {
            Some(offset) if *offset >= log.log_start => *offset,
            _ => log.log_start,
        };
        self.positions.insert(partition.clone(), position);
        Ok(position)
    }

    async fn end_offsets(
        &mut self,
        partitions: &[TopicPartition],
    ) -> Result<BTreeMap<TopicPartition, Offset>> {
        let state = self.broker.state.read().await;
        partitions
            .iter()
            .map(|partition| Ok((partition.clone(), state.partition(partition)?.high_watermark())))
            .collect()
    }

    async fn poll(&mut self, timeout: Duration) -> Result<PolledRecords> {
        self.broker.stats.polls.fetch_add(1, Ordering::SeqCst);
        let latency = self.broker.state.read().await.poll_latency;
        if !latency.is_zero() {
            sleep(latency).await;
        }
        let mut state = self.broker.state.write().await;
        if state.empty_polls > 0 {
            state.empty_polls -= 1;
            trace!(?timeout, "memory poll delayed");
            return Ok(PolledRecords::default());
        }

        let mut budget = state.max_poll_records;
        let mut polled = PolledRecords::default();
        for partition in &self.assignment {
            if budget == 0 {
                break;
            }
            let log = state.partition(partition)?;
            let from = self
                .positions
                .get(partition)
                .copied()
                .unwrap_or(log.log_start);
            let retained = log.retained(from);
            let records = &retained[..retained.len().min(budget)];
            for record in records {
                polled.push(record.clone());
            }
            budget -= records.len();

            let next = match records.last() {
                Some(last) => last.offset + 1,
                None => from.max(log.log_start),
            };
            self.positions.insert(partition.clone(), next);
        }

        trace!(count = polled.count(), "memory poll");
        Ok(polled)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    async fn broker_with_records(count: usize) -> MemoryBroker {
        let broker = MemoryBroker::new();
        broker.create_topic("orders", 2).await;
        for idx in 0..count {
            let value = format!("order-{idx}");
            broker
                .produce("orders", 0, Some("k"), Some(value.as_bytes()))
                .await
                .expect("produce");
        }
        broker
    }

    #[fluvio_future::test]
    async fn test_partitions_for_unknown_topic() {
        let broker = MemoryBroker::new();
        let mut consumer = broker
            .connect(&ClusterConfig::new("memory"))
            .await
            .expect("connect");

        let partitions = consumer.partitions_for("missing").await.expect("metadata");
        assert!(partitions.is_empty());
    }

    #[fluvio_future::test]
    async fn test_poll_resumes_from_position() {
        let broker = broker_with_records(5).await;
        broker.set_max_poll_records(2).await;
        let mut consumer = broker
            .connect(&ClusterConfig::new("memory"))
            .await
            .expect("connect");

        let partition = TopicPartition::new("orders", 0);
        consumer
            .assign(std::slice::from_ref(&partition))
            .await
            .expect("assign");
        consumer.seek(&partition, 1).await.expect("seek");

        let first = consumer.poll(Duration::ZERO).await.expect("poll");
        let offsets: Vec<_> = first.records(&partition).iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![1, 2]);
        assert_eq!(consumer.position(&partition).await.expect("position"), 3);

        let second = consumer.poll(Duration::ZERO).await.expect("poll");
        let offsets: Vec<_> = second.records(&partition).iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![3, 4]);

        let third = consumer.poll(Duration::ZERO).await.expect("poll");
        assert!(third.is_empty());
        assert_eq!(broker.poll_count(), 3);
    }

    #[fluvio_future::test]
    async fn test_seek_below_log_start_resets_to_earliest() {
        let broker = broker_with_records(6).await;
        broker.truncate_before("orders", 0, 4).await.expect("truncate");
        let mut consumer = broker
            .connect(&ClusterConfig::new("memory"))
            .await
            .expect("connect");

        let partition = TopicPartition::new("orders", 0);
        consumer
            .assign(std::slice::from_ref(&partition))
            .await
            .expect("assign");
        consumer.seek(&partition, 0).await.expect("seek");
        assert_eq!(consumer.position(&partition).await.expect("position"), 4);

        let polled = consumer.poll(Duration::ZERO).await.expect("poll");
        let offsets: Vec<_> = polled.records(&partition).iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![4, 5]);
    }

    #[fluvio_future::test]
    async fn test_seek_requires_assignment() {
        let broker = broker_with_records(1).await;
        let mut consumer = broker
            .connect(&ClusterConfig::new("memory"))
            .await
            .expect("connect");

        let result = consumer.seek(&TopicPartition::new("orders", 1), 0).await;
        assert!(matches!(result, Err(InspectError::PartitionNotAssigned(_))));
    }

    #[fluvio_future::test]
    async fn test_delayed_polls() {
        let broker = broker_with_records(3).await;
        broker.delay_polls(2).await;
        let mut consumer = broker
            .connect(&ClusterConfig::new("memory"))
            .await
            .expect("connect");
        consumer
            .assign(&[TopicPartition::new("orders", 0)])
            .await
            .expect("assign");

        assert!(consumer.poll(Duration::ZERO).await.expect("poll").is_empty());
        assert!(consumer.poll(Duration::ZERO).await.expect("poll").is_empty());
        assert_eq!(consumer.poll(Duration::ZERO).await.expect("poll").count(), 3);
    }

    #[fluvio_future::test]
    async fn test_connect_failure() {
        let broker = MemoryBroker::new();
        broker.fail_connections(Some("auth rejected")).await;

        let result = broker.connect(&ClusterConfig::new("memory:9092")).await;
        assert!(matches!(
            result,
            Err(InspectError::Connect { bootstrap, reason })
                if bootstrap == "memory:9092" && reason == "auth rejected"
        ));
        assert_eq!(broker.connect_count(), 1);
    }
}
