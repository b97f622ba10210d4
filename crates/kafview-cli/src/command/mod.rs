mod fetch;
mod topic;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use tracing::debug;

use kafview::{ClientConnector, ClusterConfig, ConfigError, ConfigFile, Inspector, MessageFormat};

use crate::output::OutputType;

pub use self::fetch::{FetchOpt, TailOpt};
pub use self::topic::{DescribeOpt, TopicsOpt};

/// Cluster selection, shared by every command
#[derive(Debug, Args, Clone, Default)]
pub struct ClusterOpt {
    /// Path to the config file, defaults to `~/.kafview/config.toml`
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Named cluster from the config file instead of the current one
    #[arg(long, global = true, value_name = "NAME")]
    pub cluster: Option<String>,

    /// Bootstrap brokers, overrides the config file
    #[arg(long, global = true, env = "KAFVIEW_BOOTSTRAP", value_name = "HOST:PORT")]
    pub bootstrap: Option<String>,
}

impl ClusterOpt {
    /// Resolve the target cluster from the config file and overrides
    pub fn cluster_config(&self) -> Result<ClusterConfig> {
        let from_file = ConfigFile::load(self.config.clone()).and_then(|file| {
            let config = file.config();
            match &self.cluster {
                Some(name) => config.cluster(name).cloned(),
                None => config.current_cluster().cloned(),
            }
        });

        match (from_file, &self.bootstrap) {
            (Ok(mut cluster), Some(bootstrap)) => {
                cluster.bootstrap = bootstrap.clone();
                Ok(cluster)
            }
            (Ok(cluster), None) => Ok(cluster),
            (Err(ConfigError::ConfigFileError { .. }), Some(bootstrap))
                if self.config.is_none() && self.cluster.is_none() =>
            {
                debug!("no config file, using bootstrap override");
                Ok(ClusterConfig::new(bootstrap.clone()))
            }
            (Err(err), None) if self.config.is_none() => {
                bail!("{err}, pass --bootstrap or create a config file")
            }
            (Err(err), _) => Err(err.into()),
        }
    }
}

/// Rendering options shared by every command
#[derive(Debug, Args, Clone, Default)]
pub struct DisplayOpt {
    /// Output format for lists
    #[arg(short = 'O', long = "output", global = true, value_enum, default_value_t)]
    pub output: OutputType,

    /// How record values are rendered
    #[arg(long, global = true, default_value_t)]
    pub format: MessageFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List topics with their partition count
    Topics(TopicsOpt),
    /// Show partitions of a topic with leaders, replicas and offsets
    Describe(DescribeOpt),
    /// Read records of one partition starting at an offset
    Fetch(FetchOpt),
    /// Read the most recent records of every partition of a topic
    Tail(TailOpt),
}

impl Command {
    pub async fn process<C: ClientConnector>(
        self,
        inspector: &Inspector<C>,
        display: &DisplayOpt,
    ) -> Result<String> {
        match self {
            Self::Topics(opt) => opt.process(inspector, display).await,
            Self::Describe(opt) => opt.process(inspector, display).await,
            Self::Fetch(opt) => opt.process(inspector, display).await,
            Self::Tail(opt) => opt.process(inspector, display).await,
        }
    }
}
