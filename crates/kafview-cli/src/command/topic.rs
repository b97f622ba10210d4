use anyhow::{Result, bail};
use clap::Parser;
use comfy_table::{Cell, Row};
use serde::Serialize;

use kafview::{ClientConnector, Inspector, PartitionDescriptor, TopicName};

use crate::output::{render_list, TableOutputHandler};

use super::DisplayOpt;

/// List topics, every topic when none is named
#[derive(Debug, Parser)]
pub struct TopicsOpt {
    /// Topics to list
    #[arg(value_name = "TOPIC")]
    topics: Vec<TopicName>,
}

impl TopicsOpt {
    pub async fn process<C: ClientConnector>(
        self,
        inspector: &Inspector<C>,
        display: &DisplayOpt,
    ) -> Result<String> {
        let topics = inspector.topics(&self.topics).await?;
        if let Some(missing) = topics.values().find(|topic| topic.is_empty()) {
            bail!("topic {} not found", missing.name);
        }
        let list = TopicList(
            topics
                .into_values()
                .map(|topic| TopicSummary {
                    partitions: topic.partitions.len(),
                    name: topic.name,
                })
                .collect(),
        );
        render_list(&list, display.output)
    }
}

/// Partitions of one topic with their offsets
#[derive(Debug, Parser)]
pub struct DescribeOpt {
    #[arg(value_name = "TOPIC")]
    topic: TopicName,
}

impl DescribeOpt {
    pub async fn process<C: ClientConnector>(
        self,
        inspector: &Inspector<C>,
        display: &DisplayOpt,
    ) -> Result<String> {
        let partitions = inspector.partition_sizes(&self.topic).await?;
        if partitions.is_empty() {
            bail!("topic {} not found", self.topic);
        }
        render_list(&PartitionList(partitions.into_values().collect()), display.output)
    }
}

#[derive(Debug, Serialize)]
struct TopicSummary {
    name: TopicName,
    partitions: usize,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct TopicList(Vec<TopicSummary>);

impl TableOutputHandler for TopicList {
    fn header(&self) -> Row {
        Row::from(["TOPIC", "PARTITIONS"])
    }

    fn content(&self) -> Vec<Row> {
        self.0
            .iter()
            .map(|topic| Row::from([Cell::new(&topic.name), Cell::new(topic.partitions)]))
            .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct PartitionList(Vec<PartitionDescriptor>);

impl TableOutputHandler for PartitionList {
    fn header(&self) -> Row {
        Row::from(["PARTITION", "LEADER", "REPLICAS", "IN-SYNC", "FIRST OFFSET", "SIZE"])
    }

    fn content(&self) -> Vec<Row> {
        self.0
            .iter()
            .map(|partition| {
                let leader = partition
                    .leader()
                    .map_or_else(|| "-".to_owned(), |replica| replica.id.to_string());
                let replicas = partition
                    .replicas
                    .iter()
                    .filter(|replica| !replica.leader)
                    .map(|replica| replica.id.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                Row::from([
                    Cell::new(partition.id),
                    Cell::new(leader),
                    Cell::new(replicas),
                    Cell::new(partition.in_sync_replicas().count()),
                    Cell::new(optional(partition.first_offset)),
                    Cell::new(optional(partition.size)),
                ])
            })
            .collect()
    }
}

fn optional(offset: Option<i64>) -> String {
    offset.map_or_else(|| "-".to_owned(), |offset| offset.to_string())
}
