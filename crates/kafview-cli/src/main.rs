mod command;
mod output;

use anyhow::Result;
use clap::Parser;
use fluvio_future::task::run_block_on;
use tracing::debug;

use kafview::{Inspector, KafkaConnector};

use self::command::{ClusterOpt, Command, DisplayOpt};

fn main() -> Result<()> {
    fluvio_future::subscriber::init_tracer(None);
    let cli = Cli::parse();

    let rendered = run_block_on(cli.process())?;
    if !rendered.is_empty() {
        println!("{}", rendered.trim_end());
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "kafview",
    about = "Browse topics and records of a Kafka cluster",
    max_term_width = 100
)]
pub struct Cli {
    #[clap(flatten)]
    cluster: ClusterOpt,
    #[clap(flatten)]
    display: DisplayOpt,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    async fn process(self) -> Result<String> {
        let config = self.cluster.cluster_config()?;
        debug!(bootstrap = %config.bootstrap, "target cluster");
        let inspector = Inspector::new(KafkaConnector, config);
        self.command.process(&inspector, &self.display).await
    }
}
