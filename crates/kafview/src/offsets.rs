use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, trace};

use crate::client::ConsumerClient;
use crate::metadata::{resolve_topology, PartitionDescriptor, TopicDescriptor};
use crate::types::{Offset, PartitionId, TopicPartition};
use crate::Result;

/// First offset of the `count` most recent records of a partition whose
/// high watermark is `end_offset`. Never negative.
pub fn latest_window_start(end_offset: Offset, count: usize) -> Offset {
    let count = Offset::try_from(count).unwrap_or(Offset::MAX);
    end_offset.saturating_sub(count).max(0)
}

/// Resolve `topic` and fill every partition's low and high watermark
pub(crate) async fn populate_watermarks<C>(
    client: &mut C,
    topic: &str,
) -> Result<BTreeMap<PartitionId, PartitionDescriptor>>
where
    C: ConsumerClient + ?Sized,
{
    let partitions = resolve_topology(client, topic).await?.partition_keys();
    if partitions.is_empty() {
        debug!(topic, "no partitions, skipping watermarks");
        return Ok(BTreeMap::new());
    }

    client.assign(&partitions).await?;
    // positions only materialize once the consumer has polled
    let _ = client.poll(Duration::ZERO).await?;
    let assignment = client.assignment();

    let mut descriptor = resolve_topology(client, topic).await?;

    client.seek_to_beginning(&assignment).await?;
    for key in &assignment {
        let first = client.position(key).await?;
        if let Some(partition) = descriptor_for(&mut descriptor, key) {
            partition.first_offset = Some(first);
        }
    }

    client.seek_to_end(&assignment).await?;
    for key in &assignment {
        let size = client.position(key).await?;
        if let Some(partition) = descriptor_for(&mut descriptor, key) {
            trace!(%key, first = ?partition.first_offset, size, "watermarks");
            partition.size = Some(size);
        }
    }

    debug!(topic, partitions = descriptor.partitions.len(), "watermarks populated");
    Ok(descriptor.partitions)
}

fn descriptor_for<'a>(
    descriptor: &'a mut TopicDescriptor,
    key: &TopicPartition,
) -> Option<&'a mut PartitionDescriptor> {
    if key.topic != descriptor.name {
        return None;
    }
    descriptor.partitions.get_mut(&key.partition)
}
