//! Relay configuration.
//!
//! Loaded from YAML (or built from defaults) and then overridden from the environment:
//! - `RELAY_SCHEME`, `RELAY_HOST`
//! - `RELAY_POLL_INTERVAL_MS` (default 1000)
//! - `RELAY_HTTP_TIMEOUT_SECS` (default 30)
//! - `RELAY_PROXY_URL`

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "omegle.com";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

fn default_scheme() -> String {
    "http".to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_servers() -> Vec<String> {
    ["", "bajor", "cardassia", "promenade", "odo-bucket"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_host")]
    pub host: String,
    /// Server name prefixes; an empty name addresses the bare host.
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,
    /// Sleep between polls that returned nothing.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            servers: default_servers(),
            poll_interval_ms: default_poll_interval_ms(),
            http_timeout_secs: default_http_timeout_secs(),
            proxy_url: None,
            user_agent: None,
        }
    }
}

impl RelayConfig {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: RelayConfig = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                e.to_string(),
                ErrorContext::new().with_source("relay_config"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw).map_err(|e| match e {
            Error::Configuration { message, context } => Error::Configuration {
                message,
                context: context.with_field_path(path.display().to_string()),
            },
            other => other,
        })
    }

    /// Apply `RELAY_*` environment variables on top of the current values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(scheme) = env::var("RELAY_SCHEME") {
            if !scheme.trim().is_empty() {
                self.scheme = scheme.trim().to_string();
            }
        }
        if let Ok(host) = env::var("RELAY_HOST") {
            if !host.trim().is_empty() {
                self.host = host.trim().to_string();
            }
        }
        if let Some(ms) = env::var("RELAY_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.poll_interval_ms = ms;
        }
        if let Some(secs) = env::var("RELAY_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|s| *s > 0)
        {
            self.http_timeout_secs = secs;
        }
        if let Ok(proxy) = env::var("RELAY_PROXY_URL") {
            self.proxy_url = Some(proxy);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::configuration_with_context(
                "server list must not be empty",
                ErrorContext::new()
                    .with_field_path("servers")
                    .with_source("relay_config"),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "host must not be empty",
                ErrorContext::new()
                    .with_field_path("host")
                    .with_source("relay_config"),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
