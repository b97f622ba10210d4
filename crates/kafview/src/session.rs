use std::fmt;

use async_lock::{Mutex, MutexGuard};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::client::ClientConnector;
use crate::config::ClusterConfig;
use crate::{InspectError, Result};

/// The one consumer handle of a process
///
/// The client is connected on first use and kept for the lifetime of the
/// session. A failed connection leaves the session empty, so the next
/// caller tries again.
pub struct ConsumerSession<C: ClientConnector> {
    connector: C,
    config: ClusterConfig,
    client: OnceCell<Mutex<C::Client>>,
}

impl<C: ClientConnector> fmt::Debug for ConsumerSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerSession")
            .field("bootstrap", &self.config.bootstrap)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl<C: ClientConnector> ConsumerSession<C> {
    pub fn new(connector: C, config: ClusterConfig) -> Self {
        Self {
            connector,
            config,
            client: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    /// Exclusive access to the client, connecting it if needed.
    ///
    /// The guard must be held for a whole operation. It is not reentrant.
    pub async fn lock(&self) -> Result<MutexGuard<'_, C::Client>> {
        let client = self
            .client
            .get_or_try_init(|| async {
                info!(
                    bootstrap = %self.config.bootstrap,
                    client_id = %self.config.client_id,
                    "connecting consumer"
                );
                let client = self.connector.connect(&self.config).await?;
                debug!("consumer connected");
                Ok::<_, InspectError>(Mutex::new(client))
            })
            .await?;

        Ok(client.lock().await)
    }
}
