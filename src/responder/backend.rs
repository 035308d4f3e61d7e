//! Backend adapters.
//!
//! Concrete conversation services differ only in how a message becomes request fields and
//! how a response body becomes a reply. [`FormBackend`] does the exchange over a
//! [`Transport`] and leaves both mappings to a [`FormCodec`].

use super::Backend;
use crate::transport::{FormFields, Transport};
use crate::types::Message;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Field mapping of a form-POST conversation service.
///
/// Codecs may keep conversation state (for example a session id echoed back by the
/// service) and update it in [`decode`](Self::decode).
pub trait FormCodec: Send + 'static {
    fn encode(&mut self, input: &Message) -> FormFields;

    /// Turn a response body into reply text. A body that signals refusal should map to
    /// [`Error::Rejected`].
    fn decode(&mut self, body: &str) -> Result<String>;
}

/// Generic form-POST backend.
pub struct FormBackend<C> {
    transport: Arc<dyn Transport>,
    url: String,
    codec: C,
}

impl<C: FormCodec> FormBackend<C> {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>, codec: C) -> Self {
        Self {
            transport,
            url: url.into(),
            codec,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl<C: FormCodec> Backend for FormBackend<C> {
    async fn exchange(&mut self, input: &Message) -> Result<String> {
        let form = self.codec.encode(input);
        let body = self.transport.post(&self.url, &form).await?;
        self.codec.decode(&body)
    }
}

/// Simple codec: fixed fields plus the message text under one field; the whole body is
/// the reply.
///
/// ```
/// use relay_chat::responder::{FieldCodec, FormCodec};
/// use relay_chat::Message;
///
/// let mut codec = FieldCodec::new("stimulus")
///     .with_fixed("sub", "Say")
///     .with_rejection("DENIED");
/// let form = codec.encode(&Message::text("hello"));
/// assert_eq!(form.encode(), "sub=Say&stimulus=hello");
/// assert!(codec.decode("DENIED").is_err());
/// assert_eq!(codec.decode("hi there").unwrap(), "hi there");
/// ```
#[derive(Debug, Clone)]
pub struct FieldCodec {
    input_field: String,
    fixed: FormFields,
    rejection: Option<String>,
}

impl FieldCodec {
    pub fn new(input_field: impl Into<String>) -> Self {
        Self {
            input_field: input_field.into(),
            fixed: FormFields::new(),
            rejection: None,
        }
    }

    pub fn with_fixed(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fixed.insert(name, value);
        self
    }

    /// Body that means the service refused to answer.
    pub fn with_rejection(mut self, body: impl Into<String>) -> Self {
        self.rejection = Some(body.into());
        self
    }
}

impl FormCodec for FieldCodec {
    fn encode(&mut self, input: &Message) -> FormFields {
        let mut form = self.fixed.clone();
        form.insert(self.input_field.clone(), input.text.clone());
        form
    }

    fn decode(&mut self, body: &str) -> Result<String> {
        let body = body.trim();
        if self.rejection.as_deref() == Some(body) {
            return Err(Error::rejected(body));
        }
        Ok(body.to_string())
    }
}

/// Re-issues the exchange while the inner backend answers with [`Error::Rejected`].
///
/// Unbounded unless [`max_attempts`](Self::max_attempts) is set; there is no backoff.
/// Other errors are returned as is.
pub struct RetryOnRejection<B> {
    inner: B,
    max_attempts: Option<u32>,
}

impl<B: Backend> RetryOnRejection<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            max_attempts: None,
        }
    }

    /// Give up after `n` attempts in total, returning the last rejection.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n.max(1));
        self
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

#[async_trait]
impl<B: Backend> Backend for RetryOnRejection<B> {
    async fn exchange(&mut self, input: &Message) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.inner.exchange(input).await {
                Err(Error::Rejected { message })
                    if self.max_attempts.map_or(true, |max| attempt < max) =>
                {
                    warn!(attempt, message = message.as_str(), "backend rejected request, retrying");
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers from a script and records every form it was sent.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<std::result::Result<String, TransportError>>>,
        seen: Mutex<Vec<(String, FormFields)>>,
    }

    impl Scripted {
        fn new(replies: Vec<std::result::Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn post(
            &self,
            url: &str,
            form: &FormFields,
        ) -> std::result::Result<String, TransportError> {
            self.seen
                .lock()
                .unwrap()
                .push((url.to_string(), form.clone()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
        }
    }

    fn backend(script: &Arc<Scripted>) -> FormBackend<FieldCodec> {
        FormBackend::new(
            Arc::clone(script) as Arc<dyn Transport>,
            "http://bot.test/ask",
            FieldCodec::new("stimulus")
                .with_fixed("start", "y")
                .with_rejection("DENIED"),
        )
    }

    #[tokio::test]
    async fn test_form_backend_exchange() {
        let script = Scripted::new(vec![Ok("  Hello human.\n".into())]);
        let mut b = backend(&script);

        let reply = b.exchange(&Message::text("hi bot")).await.unwrap();
        assert_eq!(reply, "Hello human.");

        let seen = script.seen.lock().unwrap();
        assert_eq!(seen[0].0, "http://bot.test/ask");
        assert_eq!(seen[0].1.get("start"), Some("y"));
        assert_eq!(seen[0].1.get("stimulus"), Some("hi bot"));
    }

    #[tokio::test]
    async fn test_rejection_is_retried_until_answered() {
        let script = Scripted::new(vec![
            Ok("DENIED".into()),
            Ok("DENIED".into()),
            Ok("fine, hello".into()),
        ]);
        let mut b = RetryOnRejection::new(backend(&script));

        assert_eq!(b.exchange(&Message::text("hi")).await.unwrap(), "fine, hello");
        assert_eq!(script.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_cap_returns_last_rejection() {
        let script = Scripted::new((0..5).map(|_| Ok("DENIED".into())).collect());
        let mut b = RetryOnRejection::new(backend(&script)).max_attempts(2);

        let err = b.exchange(&Message::text("hi")).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));
        assert_eq!(script.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let script = Scripted::new(vec![
            Err(TransportError::Status {
                status: 503,
                body: String::new(),
            }),
            Ok("never reached".into()),
        ]);
        let mut b = RetryOnRejection::new(backend(&script));

        let err = b.exchange(&Message::text("hi")).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(script.seen.lock().unwrap().len(), 1);
    }
}
