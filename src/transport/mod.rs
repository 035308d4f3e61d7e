//! 传输层：中继与应答后端共用的表单 POST 能力。
//!
//! # Transport Capability
//!
//! Everything the crate sends over the network goes through [`Transport::post`]: a
//! form-encoded POST that returns the full (trimmed) response body as text. The session
//! client and the form backends only depend on the trait, so tests substitute a scripted
//! implementation and production uses [`HttpTransport`].

pub mod http;

pub use http::HttpTransport;

use async_trait::async_trait;

/// Ordered string key/value pairs sent as an `application/x-www-form-urlencoded` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    fields: Vec<(String, String)>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, keeping insertion order.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a field, replacing the value in place if the key already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `k1=v1&k2=v2` with both sides form-urlencoded.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.fields {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = FormFields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Synchronous-looking request/response exchange with a remote endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `form` to `url` and return the whole response body.
    async fn post(&self, url: &str, form: &FormFields) -> Result<String, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Other(String),
}
