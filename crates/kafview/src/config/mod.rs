mod cluster;
mod config;

pub use cluster::{ClusterConfig, FetchConfig, SecurityConfig, DEFAULT_CLIENT_ID};
pub use config::{Config, ConfigError, ConfigFile, CONFIG_PATH_ENV};
