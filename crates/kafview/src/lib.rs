//! # kafview
//!
//! Read-only record retrieval over a partitioned, append-only log cluster.
//!
//! An [`Inspector`] owns a single consumer handle and serializes every
//! operation on it. It can describe a topic's partitions, fill in their
//! watermarks and return bounded windows of records: either the first `N`
//! records of one partition from an offset, or the `N` most recent records
//! of every partition of a topic.
//!
//! ```no_run
//! # use kafview::{Inspector, MemoryBroker, ClusterConfig, TextDeserializer};
//! # async fn example() -> kafview::Result<()> {
//! let broker = MemoryBroker::new();
//! let inspector = Inspector::new(broker, ClusterConfig::new("localhost:9092"));
//! let records = inspector.fetch_latest("orders", 10, &TextDeserializer).await?;
//! for record in records {
//!     println!("{}@{}: {}", record.partition, record.offset, record.value);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod fetch;
mod inspector;
mod metadata;
mod offsets;
mod record;
mod session;

pub mod client;
pub mod config;
pub mod deserializer;
pub mod types;

pub use error::{InspectError, Result};
pub use config::{ClusterConfig, ConfigError, ConfigFile, FetchConfig, SecurityConfig};
pub use client::{
    BrokerRecord, ClientConnector, ConsumerClient, MemoryBroker, MemoryConsumer,
    PartitionMetadata, PolledRecords, RecordHeader, TimestampType,
};
#[cfg(feature = "kafka")]
pub use client::{KafkaConnector, KafkaConsumer};
pub use deserializer::{
    MessageDeserializer, MessageFormat, TextDeserializer, BinaryDeserializer, DynamicDeserializer,
    JsonDeserializer,
};
pub use fetch::{RetrievalRequest, DEFAULT_POLL_TIMEOUT};
pub use inspector::Inspector;
pub use metadata::{TopicDescriptor, PartitionDescriptor, PartitionReplica};
pub use offsets::latest_window_start;
pub use record::{RetrievedRecord, EMPTY_VALUE};
pub use session::ConsumerSession;
pub use types::{NodeId, Offset, PartitionId, TopicName, TopicPartition};
