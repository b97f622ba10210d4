use serde::Serialize;

use crate::client::{BrokerRecord, RecordHeader, TimestampType};
use crate::deserializer::MessageDeserializer;
use crate::types::{Offset, PartitionId, TopicName};

/// Rendered value of a record without payload
pub const EMPTY_VALUE: &str = "empty";

/// A record ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievedRecord {
    pub topic: TopicName,
    pub partition: PartitionId,
    pub offset: Offset,
    pub timestamp: i64,
    pub timestamp_type: TimestampType,
    /// never preserved, always `0`
    pub timestamp_delta: i64,
    pub serialized_key_size: i32,
    pub serialized_value_size: i32,
    pub key: Option<String>,
    pub value: String,
    pub headers: Vec<RecordHeader>,
    pub leader_epoch: Option<i32>,
}

impl RetrievedRecord {
    /// Project a raw record, rendering its value with `deserializer`
    pub fn project(record: BrokerRecord, deserializer: &dyn MessageDeserializer) -> Self {
        let value = match &record.value {
            Some(payload) => deserializer.deserialize(payload),
            None => EMPTY_VALUE.to_owned(),
        };

        Self {
            topic: record.topic,
            partition: record.partition,
            offset: record.offset,
            timestamp: record.timestamp,
            timestamp_type: record.timestamp_type,
            timestamp_delta: 0,
            serialized_key_size: record.serialized_key_size,
            serialized_value_size: record.serialized_value_size,
            key: record.key,
            value,
            headers: record.headers,
            leader_epoch: record.leader_epoch,
        }
    }
}

pub(crate) fn project_all(
    records: impl IntoIterator<Item = BrokerRecord>,
    deserializer: &dyn MessageDeserializer,
) -> Vec<RetrievedRecord> {
    records
        .into_iter()
        .map(|record| RetrievedRecord::project(record, deserializer))
        .collect()
}
