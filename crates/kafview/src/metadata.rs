//!
//! # Topic topology
//!
//! Partition layout of a topic, as reported by the cluster at call time.
//!
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::client::{ConsumerClient, PartitionMetadata};
use crate::types::{NodeId, Offset, PartitionId, TopicName, TopicPartition};
use crate::Result;

/// A topic and its partitions, ordered by partition id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicDescriptor {
    pub name: TopicName,
    pub partitions: BTreeMap<PartitionId, PartitionDescriptor>,
}

impl TopicDescriptor {
    pub fn new(name: impl Into<TopicName>) -> Self {
        Self {
            name: name.into(),
            partitions: BTreeMap::new(),
        }
    }

    /// An unknown topic resolves to a descriptor without partitions
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn partition_keys(&self) -> Vec<TopicPartition> {
        self.partitions
            .keys()
            .map(|id| TopicPartition::new(self.name.clone(), *id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionDescriptor {
    pub id: PartitionId,
    pub replicas: Vec<PartitionReplica>,
    /// low watermark, inclusive
    pub first_offset: Option<Offset>,
    /// high watermark, the next offset to be written
    pub size: Option<Offset>,
}

impl PartitionDescriptor {
    pub fn new(id: PartitionId) -> Self {
        Self {
            id,
            replicas: vec![],
            first_offset: None,
            size: None,
        }
    }

    pub fn add_replica(&mut self, replica: PartitionReplica) {
        self.replicas.push(replica);
    }

    pub fn leader(&self) -> Option<&PartitionReplica> {
        self.replicas.iter().find(|replica| replica.leader)
    }

    pub fn in_sync_replicas(&self) -> impl Iterator<Item = &PartitionReplica> {
        self.replicas.iter().filter(|replica| replica.in_sync)
    }

    /// Number of retained records, once watermarks are known
    pub fn record_count(&self) -> Option<Offset> {
        Some(self.size? - self.first_offset?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionReplica {
    pub id: NodeId,
    pub in_sync: bool,
    pub leader: bool,
}

impl PartitionReplica {
    pub fn new(id: NodeId, in_sync: bool, leader: bool) -> Self {
        Self {
            id,
            in_sync,
            leader,
        }
    }
}

impl From<&PartitionMetadata> for PartitionDescriptor {
    /// The leader is listed first and flagged, then every replica the
    /// cluster reports, the leader's node included again.
    fn from(metadata: &PartitionMetadata) -> Self {
        let mut partition = PartitionDescriptor::new(metadata.id);
        if let Some(leader) = metadata.leader {
            partition.add_replica(PartitionReplica::new(leader, true, true));
        }
        for node in &metadata.replicas {
            partition.add_replica(PartitionReplica::new(*node, true, false));
        }
        partition
    }
}

/// Query partition metadata for `topic` and build its descriptor
pub(crate) async fn resolve_topology<C>(client: &mut C, topic: &str) -> Result<TopicDescriptor>
where
    C: ConsumerClient + ?Sized,
{
    let metadata = client.partitions_for(topic).await?;
    let mut descriptor = TopicDescriptor::new(topic);
    for partition in &metadata {
        trace!(topic, partition = partition.id, leader = ?partition.leader, "partition metadata");
        descriptor
            .partitions
            .insert(partition.id, PartitionDescriptor::from(partition));
    }
    debug!(topic, partitions = descriptor.partitions.len(), "resolved topology");
    Ok(descriptor)
}

/// Resolve several topics, every topic in the cluster when `topics` is empty
pub(crate) async fn resolve_topologies<C>(
    client: &mut C,
    topics: &[TopicName],
) -> Result<BTreeMap<TopicName, TopicDescriptor>>
where
    C: ConsumerClient + ?Sized,
{
    let names = if topics.is_empty() {
        client.list_topics().await?
    } else {
        topics.to_vec()
    };

    let mut descriptors = BTreeMap::new();
    for name in names {
        let descriptor = resolve_topology(client, &name).await?;
        descriptors.insert(name, descriptor);
    }
    Ok(descriptors)
}
