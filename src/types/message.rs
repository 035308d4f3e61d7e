//! Chat line plus the time it took to produce or transmit it

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An incoming or outgoing chat line.
///
/// `latency_ms` is informational: for received messages it is the duration of the poll
/// that delivered the line, for replies the time the backend took, for sent messages the
/// send exchange plus any latency the caller asked to add.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    #[serde(default)]
    pub latency_ms: u64,
}

impl Message {
    pub fn new(text: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            text: text.into(),
            latency_ms,
        }
    }

    /// A message with zero latency.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, 0)
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::text(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::text(text)
    }
}
