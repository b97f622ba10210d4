use anyhow::{Result, bail};
use clap::Parser;
use comfy_table::{Cell, Row};
use serde::Serialize;

use kafview::{
    ClientConnector, Inspector, Offset, PartitionId, RetrievalRequest, RetrievedRecord, TopicName,
    TopicPartition,
};

use crate::output::{render_list, TableOutputHandler};

use super::DisplayOpt;

const DEFAULT_COUNT: &str = "10";

/// Read up to `count` records of one partition
#[derive(Debug, Parser)]
pub struct FetchOpt {
    #[arg(value_name = "TOPIC")]
    topic: TopicName,

    #[arg(short, long, default_value_t = 0)]
    partition: PartitionId,

    /// First offset to read
    #[arg(short, long, default_value_t = 0)]
    offset: Offset,

    /// Maximum number of records
    #[arg(short = 'n', long, default_value = DEFAULT_COUNT)]
    count: usize,
}

impl FetchOpt {
    fn request(&self) -> RetrievalRequest {
        RetrievalRequest::from_offset(
            TopicPartition::new(self.topic.clone(), self.partition),
            self.offset,
            self.count,
        )
    }

    pub async fn process<C: ClientConnector>(
        self,
        inspector: &Inspector<C>,
        display: &DisplayOpt,
    ) -> Result<String> {
        retrieve(inspector, &self.request(), display).await
    }
}

/// Read the most recent records of each partition
#[derive(Debug, Parser)]
pub struct TailOpt {
    #[arg(value_name = "TOPIC")]
    topic: TopicName,

    /// Records per partition
    #[arg(short = 'n', long, default_value = DEFAULT_COUNT)]
    count: usize,
}

impl TailOpt {
    pub async fn process<C: ClientConnector>(
        self,
        inspector: &Inspector<C>,
        display: &DisplayOpt,
    ) -> Result<String> {
        if inspector.topic(&self.topic).await?.is_empty() {
            bail!("topic {} not found", self.topic);
        }
        let request = RetrievalRequest::latest(self.topic, self.count);
        retrieve(inspector, &request, display).await
    }
}

async fn retrieve<C: ClientConnector>(
    inspector: &Inspector<C>,
    request: &RetrievalRequest,
    display: &DisplayOpt,
) -> Result<String> {
    let deserializer = display.format.deserializer();
    let records = inspector.retrieve(request, deserializer.as_ref()).await?;
    render_list(&RecordList(records), display.output)
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct RecordList(Vec<RetrievedRecord>);

impl TableOutputHandler for RecordList {
    fn header(&self) -> Row {
        Row::from(["PARTITION", "OFFSET", "TIMESTAMP", "KEY", "VALUE"])
    }

    fn content(&self) -> Vec<Row> {
        self.0
            .iter()
            .map(|record| {
                Row::from([
                    Cell::new(record.partition),
                    Cell::new(record.offset),
                    Cell::new(record.timestamp),
                    Cell::new(record.key.as_deref().unwrap_or("-")),
                    Cell::new(&record.value),
                ])
            })
            .collect()
    }
}
