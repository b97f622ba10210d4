//!
//! # Cluster Configurations
//!
//! Connection and fetch parameters for a single cluster.
//!
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::fetch::DEFAULT_POLL_TIMEOUT;

pub const DEFAULT_CLIENT_ID: &str = "kafview-client";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_POLL_RECORDS: usize = 100;

/// Cluster target configuration
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ClusterConfig {
    /// Comma separated list of bootstrap brokers
    #[serde(alias = "brokers")]
    pub bootstrap: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Transport and authentication options, passed to the client untouched
    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_owned()
}

impl ClusterConfig {
    /// Create a new cluster configuration with no security options.
    pub fn new<S: Into<String>>(bootstrap: S) -> Self {
        Self {
            bootstrap: bootstrap.into(),
            client_id: default_client_id(),
            security: SecurityConfig::default(),
            fetch: FetchConfig::default(),
        }
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Consumer properties handed to the broker client at connection time.
    ///
    /// Offsets are never committed and unknown positions reset to the
    /// earliest retained record. Security options are layered last so that
    /// explicit `options` entries win over the named fields.
    pub fn client_properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        properties.insert("bootstrap.servers".to_owned(), self.bootstrap.clone());
        properties.insert("client.id".to_owned(), self.client_id.clone());
        properties.insert("enable.auto.commit".to_owned(), "false".to_owned());
        properties.insert("auto.offset.reset".to_owned(), "earliest".to_owned());

        if self.security.is_secured() {
            if let Some(protocol) = &self.security.protocol {
                properties.insert("security.protocol".to_owned(), protocol.clone());
            }
            if let Some(mechanism) = &self.security.sasl_mechanism {
                properties.insert("sasl.mechanism".to_owned(), mechanism.clone());
            }
        }

        for (key, value) in &self.security.options {
            properties.insert(key.clone(), value.clone());
        }

        properties
    }
}

/// Opaque security settings
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// e.g. `SASL_SSL`
    #[serde(default)]
    pub protocol: Option<String>,
    /// e.g. `PLAIN`, `SCRAM-SHA-512`
    #[serde(default)]
    pub sasl_mechanism: Option<String>,
    /// Any other client property, such as credentials or trust stores
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl SecurityConfig {
    pub fn is_secured(&self) -> bool {
        self.protocol.is_some()
    }
}

/// Tuning of the bounded poll loop
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// How long a single poll waits for records
    #[serde(with = "humantime_serde")]
    pub poll_timeout: Duration,
    /// Timeout for metadata and watermark requests
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Upper bound of records handed back by one poll
    pub max_poll_records: usize,
    /// Stop after this many consecutive empty polls. Unbounded when unset.
    pub idle_poll_limit: Option<u32>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_poll_records: DEFAULT_MAX_POLL_RECORDS,
            idle_poll_limit: None,
        }
    }
}
