//!
//! # Bounded poll loops
//!
//! Both loops poll until either enough records were gathered or the
//! high watermark observed before the first poll has been reached.
//! Offsets the consumer moves past without delivering them, expired
//! records for instance, count as reached.
//!
use std::collections::BTreeMap;
use std::slice;
use std::time::Duration;

use tracing::{debug, trace};

use crate::client::{BrokerRecord, ConsumerClient};
use crate::config::FetchConfig;
use crate::deserializer::MessageDeserializer;
use crate::metadata::resolve_topology;
use crate::offsets::latest_window_start;
use crate::record::{project_all, RetrievedRecord};
use crate::types::{Offset, TopicName, TopicPartition};
use crate::{InspectError, Result};

/// How long one poll waits unless configured otherwise
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// A bounded window of records to retrieve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalRequest {
    /// Up to `count` records of one partition, starting at `offset`
    FromOffset {
        partition: TopicPartition,
        offset: Offset,
        count: usize,
    },
    /// The `count` most recent records of every partition of `topic`
    Latest { topic: TopicName, count: usize },
}

impl RetrievalRequest {
    pub fn from_offset(partition: impl Into<TopicPartition>, offset: Offset, count: usize) -> Self {
        Self::FromOffset {
            partition: partition.into(),
            offset,
            count,
        }
    }

    pub fn latest(topic: impl Into<TopicName>, count: usize) -> Self {
        Self::Latest {
            topic: topic.into(),
            count,
        }
    }
}

/// Records gathered for one partition
#[derive(Debug)]
struct PartitionWindow {
    limit: usize,
    /// last offset present when the loop started
    latest_offset: Offset,
    /// highest offset delivered so far
    last_seen: Offset,
    records: Vec<BrokerRecord>,
}

impl PartitionWindow {
    /// `start_offset` is the consumer position, not the requested offset
    fn new(start_offset: Offset, end_offset: Offset, limit: usize) -> Self {
        Self {
            limit,
            latest_offset: end_offset - 1,
            last_seen: start_offset - 1,
            records: vec![],
        }
    }

    fn count_reached(&self) -> bool {
        self.records.len() >= self.limit
    }

    fn watermark_reached(&self) -> bool {
        self.last_seen >= self.latest_offset
    }

    fn is_pending(&self) -> bool {
        !self.count_reached() && !self.watermark_reached()
    }

    /// Everything below `position` is behind the consumer
    fn skip_to(&mut self, position: Offset) {
        self.last_seen = self.last_seen.max(position - 1);
    }

    /// Keep the whole batch, surplus is cut in [`Self::into_records`]
    fn append(&mut self, batch: Vec<BrokerRecord>) {
        if let Some(last) = batch.last() {
            self.last_seen = last.offset;
        }
        self.records.extend(batch);
    }

    /// Keep only records up to the observed watermark and within the limit
    fn append_within_watermark(&mut self, batch: Vec<BrokerRecord>) {
        for record in batch {
            self.last_seen = self.last_seen.max(record.offset);
            if record.offset <= self.latest_offset && !self.count_reached() {
                self.records.push(record);
            }
        }
    }

    fn into_records(mut self) -> Vec<BrokerRecord> {
        self.records.truncate(self.limit);
        self.records
    }
}

/// Counts consecutive empty polls against an optional limit
#[derive(Debug)]
struct IdlePolls {
    limit: Option<u32>,
    consecutive: u32,
}

impl IdlePolls {
    fn new(limit: Option<u32>) -> Self {
        Self {
            limit,
            consecutive: 0,
        }
    }

    /// Returns true once the limit is exhausted
    fn observe(&mut self, empty: bool) -> bool {
        if !empty {
            self.consecutive = 0;
            return false;
        }
        self.consecutive = self.consecutive.saturating_add(1);
        self.limit.is_some_and(|limit| self.consecutive >= limit)
    }
}

/// Up to `count` records of `partition` starting at `start_offset`
pub(crate) async fn fetch_from<C>(
    client: &mut C,
    partition: &TopicPartition,
    start_offset: Offset,
    count: usize,
    config: &FetchConfig,
    deserializer: &dyn MessageDeserializer,
) -> Result<Vec<RetrievedRecord>>
where
    C: ConsumerClient + ?Sized,
{
    if start_offset < 0 {
        return Err(InspectError::NegativeOffset(start_offset));
    }
    if count == 0 {
        debug!(%partition, "nothing requested");
        return Ok(vec![]);
    }

    let target = slice::from_ref(partition);
    client.assign(target).await?;
    client.seek(partition, start_offset).await?;
    let end_offset = client
        .end_offsets(target)
        .await?
        .get(partition)
        .copied()
        .ok_or_else(|| InspectError::PartitionNotFound(partition.clone()))?;
    // a seek below the retained log lands on its first offset
    let position = client.position(partition).await?;

    let mut window = PartitionWindow::new(position, end_offset, count);
    let mut idle = IdlePolls::new(config.idle_poll_limit);
    let mut polls = 0usize;
    while window.is_pending() {
        let batch = client.poll(config.poll_timeout).await?.take(partition);
        polls += 1;
        trace!(
            %partition,
            polled = batch.len(),
            gathered = window.records.len(),
            last_seen = window.last_seen,
            "poll"
        );
        if idle.observe(batch.is_empty()) {
            debug!(%partition, polls, "idle poll limit reached");
            break;
        }
        if batch.is_empty() {
            window.skip_to(client.position(partition).await?);
        }
        window.append(batch);
    }

    let records = window.into_records();
    debug!(
        %partition,
        start_offset,
        position,
        end_offset,
        count,
        returned = records.len(),
        polls,
        "fetched from offset"
    );
    Ok(project_all(records, deserializer))
}

/// The `count` most recent records of every partition of `topic`, in
/// ascending partition order
pub(crate) async fn fetch_latest<C>(
    client: &mut C,
    topic: &str,
    count: usize,
    config: &FetchConfig,
    deserializer: &dyn MessageDeserializer,
) -> Result<Vec<RetrievedRecord>>
where
    C: ConsumerClient + ?Sized,
{
    if count == 0 {
        debug!(topic, "nothing requested");
        return Ok(vec![]);
    }

    let partitions = resolve_topology(client, topic).await?.partition_keys();
    if partitions.is_empty() {
        debug!(topic, "no partitions");
        return Ok(vec![]);
    }

    client.assign(&partitions).await?;
    let end_offsets = client.end_offsets(&partitions).await?;

    let mut windows = BTreeMap::new();
    for (partition, end_offset) in end_offsets {
        let start_offset = latest_window_start(end_offset, count);
        client.seek(&partition, start_offset).await?;
        let position = client.position(&partition).await?;
        trace!(%partition, start_offset, position, end_offset, "window");
        windows.insert(partition, PartitionWindow::new(position, end_offset, count));
    }

    let target = count.saturating_mul(windows.len());
    let gathered = |windows: &BTreeMap<TopicPartition, PartitionWindow>| -> usize {
        windows.values().map(|window| window.records.len()).sum()
    };

    let mut idle = IdlePolls::new(config.idle_poll_limit);
    let mut polls = 0usize;
    while gathered(&windows) < target && windows.values().any(PartitionWindow::is_pending) {
        let mut polled = client.poll(config.poll_timeout).await?;
        polls += 1;
        trace!(topic, polled = polled.count(), gathered = gathered(&windows), "poll");
        if idle.observe(polled.is_empty()) {
            debug!(topic, polls, "idle poll limit reached");
            break;
        }
        for (partition, window) in windows.iter_mut() {
            let batch = polled.take(partition);
            if batch.is_empty() && window.is_pending() {
                window.skip_to(client.position(partition).await?);
            }
            window.append_within_watermark(batch);
        }
        for partition in polled.partitions() {
            trace!(%partition, "records for unassigned partition dropped");
        }
    }

    let records: Vec<BrokerRecord> = windows
        .into_values()
        .flat_map(PartitionWindow::into_records)
        .collect();
    debug!(
        topic,
        partitions = partitions.len(),
        count,
        returned = records.len(),
        polls,
        "fetched latest"
    );
    Ok(project_all(records, deserializer))
}
