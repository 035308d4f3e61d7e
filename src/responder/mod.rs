//! 应答器模块：单飞处理契约与后端适配器。
//!
//! # Responder
//!
//! A [`Responder`] turns an incoming [`Message`] into a reply. Each instance processes at
//! most one message at a time; a call made while another is in flight is rejected with
//! [`Error::Busy`](crate::Error::Busy) instead of being queued.
//!
//! | Type | Role |
//! |------|------|
//! | [`Chatbot`] | Single-flight [`Responder`] over any [`Backend`] |
//! | [`FormBackend`] | Form-POST [`Backend`] with pluggable field mapping ([`FormCodec`]) |
//! | [`RetryOnRejection`] | Re-issues an exchange when the backend answers with a rejection |

use crate::types::{Message, ProcessingEvent};
use crate::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

mod backend;
mod chatbot;

pub use backend::{FieldCodec, FormBackend, FormCodec, RetryOnRejection};
pub use chatbot::Chatbot;

/// Conversation service adapter.
///
/// Implementations own whatever conversation state the service needs between exchanges
/// (session ids, history), hence `&mut self`.
#[async_trait]
pub trait Backend: Send + 'static {
    /// One request/response round trip; returns the reply text.
    async fn exchange(&mut self, input: &Message) -> Result<String>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Box<B> {
    async fn exchange(&mut self, input: &Message) -> Result<String> {
        (**self).exchange(input).await
    }
}

/// Single-flight reply producer.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply and wait for it.
    ///
    /// Emits `Started(input)` then `Finished(reply)`; the reply's latency is the time the
    /// backend took. On failure `Failed` is emitted and the error returned.
    async fn process(&self, input: Message) -> Result<Message>;

    async fn process_text(&self, text: &str) -> Result<String> {
        Ok(self.process(Message::text(text)).await?.text)
    }

    /// Start producing a reply on a background task.
    ///
    /// Fails immediately with `Busy` if a reply is in flight. The outcome is reported only
    /// through `Finished` or `Failed`. Must be called within a tokio runtime.
    fn process_async(&self, input: Message) -> Result<()>;

    fn is_processing(&self) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<ProcessingEvent>;
}
