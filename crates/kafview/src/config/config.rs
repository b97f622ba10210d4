//!
//! # Main Configuration file
//!
//! Named clusters and the one currently selected.
//!
use std::collections::BTreeMap;
use std::env;
use std::fs::read_to_string;
use std::io::Error as IoError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use dirs::home_dir;

use super::ClusterConfig;

/// Environment variable overriding the default config location
pub const CONFIG_PATH_ENV: &str = "KAFVIEW_CONFIG";

const CONFIG_DIR: &str = ".kafview";
const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {msg}")]
    ConfigFileError { msg: String, source: IoError },
    #[error("Failed to deserialize config {msg}")]
    TomlError {
        msg: String,
        source: toml::de::Error,
    },
    #[error("Config has no current cluster")]
    NoCurrentCluster,
    #[error("No cluster config named {name}")]
    NoClusterConfig { name: String },
}

fn config_file_error(msg: &str, source: IoError) -> ConfigError {
    ConfigError::ConfigFileError {
        msg: msg.to_owned(),
        source,
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub current_cluster: Option<String>,
    #[serde(default)]
    pub cluster: BTreeMap<String, ClusterConfig>,
}

impl Config {
    /// Cluster selected by `current_cluster`.
    ///
    /// A file holding exactly one cluster doesn't need to name it.
    pub fn current_cluster(&self) -> Result<&ClusterConfig, ConfigError> {
        match &self.current_cluster {
            Some(name) => self.cluster(name),
            None if self.cluster.len() == 1 => self
                .cluster
                .values()
                .next()
                .ok_or(ConfigError::NoCurrentCluster),
            None => Err(ConfigError::NoCurrentCluster),
        }
    }

    pub fn cluster(&self, name: &str) -> Result<&ClusterConfig, ConfigError> {
        self.cluster
            .get(name)
            .ok_or_else(|| ConfigError::NoClusterConfig {
                name: name.to_owned(),
            })
    }
}

pub struct ConfigFile {
    path: PathBuf,
    config: Config,
}

impl ConfigFile {
    /// try to load from supplied path or default location
    pub fn load(optional_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = match optional_path {
            Some(path) => path,
            None => Self::default_file_path().map_err(|e| config_file_error("default path", e))?,
        };
        Self::from_file(path)
    }

    /// read from file
    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        debug!(?path_ref, "loading config from");
        let file_str = read_to_string(path_ref)
            .map_err(|e| config_file_error(&format!("{:?}", path_ref.as_os_str()), e))?;
        let config = toml::from_str(&file_str).map_err(|e| ConfigError::TomlError {
            msg: path_ref.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            path: path_ref.to_owned(),
            config,
        })
    }

    /// find default path where config is stored. precedence is:
    /// 1) environment variable `KAFVIEW_CONFIG`
    /// 2) home directory ~/.kafview/config.toml
    pub fn default_file_path() -> Result<PathBuf, IoError> {
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let mut path = home_dir()
            .ok_or_else(|| IoError::new(ErrorKind::InvalidInput, "can't get home directory"))?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return a reference to the internal Config
    pub fn config(&self) -> &Config {
        &self.config
    }
}
