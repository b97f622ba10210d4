use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::client::ClientConnector;
use crate::config::{ClusterConfig, FetchConfig};
use crate::deserializer::MessageDeserializer;
use crate::fetch::{self, RetrievalRequest};
use crate::metadata::{resolve_topologies, resolve_topology, PartitionDescriptor, TopicDescriptor};
use crate::offsets::populate_watermarks;
use crate::record::RetrievedRecord;
use crate::session::ConsumerSession;
use crate::types::{Offset, PartitionId, TopicName, TopicPartition};
use crate::Result;

/// Read-only view of a cluster through a single consumer
///
/// Every operation holds the consumer for its whole duration, so concurrent
/// callers are served one after another.
#[derive(Debug)]
pub struct Inspector<C: ClientConnector> {
    session: ConsumerSession<C>,
    fetch: FetchConfig,
}

impl<C: ClientConnector> Inspector<C> {
    pub fn new(connector: C, config: ClusterConfig) -> Self {
        let fetch = config.fetch.clone();
        Self {
            session: ConsumerSession::new(connector, config),
            fetch,
        }
    }

    pub fn session(&self) -> &ConsumerSession<C> {
        &self.session
    }

    /// Partition layout of `topic`. Unknown topics have no partitions.
    #[instrument(skip(self))]
    pub async fn topic(&self, topic: &str) -> Result<TopicDescriptor> {
        let mut client = self.session.lock().await?;
        resolve_topology(&mut *client, topic).await
    }

    /// Layout of the named topics, or of every topic when `topics` is empty
    #[instrument(skip(self))]
    pub async fn topics(&self, topics: &[TopicName]) -> Result<BTreeMap<TopicName, TopicDescriptor>> {
        let mut client = self.session.lock().await?;
        let descriptors = resolve_topologies(&mut *client, topics).await?;
        debug!(topics = descriptors.len(), "listed topics");
        Ok(descriptors)
    }

    /// Partitions of `topic` with their first offset and size filled in
    #[instrument(skip(self))]
    pub async fn partition_sizes(
        &self,
        topic: &str,
    ) -> Result<BTreeMap<PartitionId, PartitionDescriptor>> {
        let mut client = self.session.lock().await?;
        populate_watermarks(&mut *client, topic).await
    }

    /// Up to `count` records of one partition starting at `offset`
    #[instrument(skip(self, deserializer))]
    pub async fn fetch_from(
        &self,
        partition: &TopicPartition,
        offset: Offset,
        count: usize,
        deserializer: &dyn MessageDeserializer,
    ) -> Result<Vec<RetrievedRecord>> {
        let mut client = self.session.lock().await?;
        fetch::fetch_from(&mut *client, partition, offset, count, &self.fetch, deserializer).await
    }

    /// The `count` most recent records of each partition of `topic`
    #[instrument(skip(self, deserializer))]
    pub async fn fetch_latest(
        &self,
        topic: &str,
        count: usize,
        deserializer: &dyn MessageDeserializer,
    ) -> Result<Vec<RetrievedRecord>> {
        let mut client = self.session.lock().await?;
        fetch::fetch_latest(&mut *client, topic, count, &self.fetch, deserializer).await
    }

    #[instrument(skip(self, deserializer))]
    pub async fn retrieve(
        &self,
        request: &RetrievalRequest,
        deserializer: &dyn MessageDeserializer,
    ) -> Result<Vec<RetrievedRecord>> {
        match request {
            RetrievalRequest::FromOffset {
                partition,
                offset,
                count,
            } => self.fetch_from(partition, *offset, *count, deserializer).await,
            RetrievalRequest::Latest { topic, count } => {
                self.fetch_latest(topic, *count, deserializer).await
            }
        }
    }
}

#[cfg(feature = "kafka")]
impl Inspector<crate::client::KafkaConnector> {
    /// Inspector backed by a librdkafka consumer
    pub fn connect_kafka(config: ClusterConfig) -> Self {
        Self::new(crate::client::KafkaConnector::default(), config)
    }
}
