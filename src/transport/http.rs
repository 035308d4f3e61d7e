use crate::config::RelayConfig;
use crate::transport::{FormFields, Transport, TransportError};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Proxy;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// reqwest-backed [`Transport`].
///
/// Non-2xx responses are reported as [`TransportError::Status`] so that callers treat
/// them the same way as connection failures.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .pool_max_idle_per_host(8);

        if let Some(proxy_url) = &config.proxy_url {
            if let Ok(proxy) = Proxy::all(proxy_url) {
                builder = builder.proxy(proxy);
            } else {
                tracing::warn!(proxy = proxy_url.as_str(), "ignoring invalid relay proxy url");
            }
        }

        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, form: &FormFields) -> std::result::Result<String, TransportError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
            .body(form.encode())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        Ok(body.trim().to_string())
    }
}
