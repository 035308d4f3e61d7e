use crate::config::RelayConfig;
use crate::relay::ServerPool;
use crate::session::client::SessionClient;
use crate::transport::{HttpTransport, Transport};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Builder for [`SessionClient`].
///
/// Everything is optional: without a config the defaults plus `RELAY_*` environment
/// overrides are used, without a transport an [`HttpTransport`] is built from the config,
/// and without a pool the client gets a private one. Pass the same `Arc<ServerPool>` to
/// several builders to let their sessions share server rotation and user counts.
pub struct SessionClientBuilder {
    config: Option<RelayConfig>,
    transport: Option<Arc<dyn Transport>>,
    pool: Option<Arc<ServerPool>>,
    poll_interval: Option<Duration>,
    event_capacity: usize,
}

impl SessionClientBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            transport: None,
            pool: None,
            poll_interval: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn pool(mut self, pool: Arc<ServerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Override the config's sleep between empty polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Buffer size of the notification channel; slow subscribers beyond it see `Lagged`.
    pub fn event_capacity(mut self, n: usize) -> Self {
        self.event_capacity = n.max(1);
        self
    }

    pub fn build(self) -> Result<SessionClient> {
        let config = self.config.unwrap_or_else(RelayConfig::from_env);
        config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&config)?),
        };
        let pool = match self.pool {
            Some(p) => p,
            None => Arc::new(ServerPool::from_config(&config)?),
        };
        let poll_interval = self.poll_interval.unwrap_or_else(|| config.poll_interval());

        Ok(SessionClient::from_parts(
            transport,
            pool,
            poll_interval,
            self.event_capacity,
        ))
    }
}

impl Default for SessionClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
