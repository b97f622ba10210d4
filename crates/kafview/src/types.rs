use std::fmt;

use serde::{Deserialize, Serialize};

pub type TopicName = String;
pub type PartitionId = i32;
pub type NodeId = i32;
pub type Offset = i64;

/// Key of a single partition of a topic
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: TopicName,
    pub partition: PartitionId,
}

impl TopicPartition {
    pub fn new(topic: impl Into<TopicName>, partition: PartitionId) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

impl<S: Into<TopicName>> From<(S, PartitionId)> for TopicPartition {
    fn from(key: (S, PartitionId)) -> Self {
        Self::new(key.0, key.1)
    }
}

#[cfg(test)]
mod test {
    use super::TopicPartition;

    #[test]
    fn test_topic_partition_order() {
        let mut keys = vec![
            TopicPartition::new("orders", 2),
            TopicPartition::new("audit", 7),
            TopicPartition::new("orders", 0),
        ];
        keys.sort();

        assert_eq!(keys[0].to_string(), "audit-7");
        assert_eq!(keys[1].to_string(), "orders-0");
        assert_eq!(keys[2].to_string(), "orders-2");
    }
}
