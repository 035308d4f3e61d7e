//! Notifications emitted by sessions and responders

use crate::types::Message;
use serde::{Deserialize, Serialize};

/// Everything a [`SessionClient`](crate::SessionClient) reports to its subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum SessionEvent {
    /// The relay issued a session id.
    #[serde(rename = "Connected")]
    Connected {
        session_id: String,
        server_index: usize,
    },

    /// The session ended (explicitly, after the stranger left, or on transport failure).
    #[serde(rename = "Disconnected")]
    Disconnected,

    /// Waiting for the relay to pair us with a stranger.
    #[serde(rename = "Waiting")]
    Waiting,

    #[serde(rename = "StrangerConnected")]
    StrangerConnected,

    #[serde(rename = "StrangerDisconnected")]
    StrangerDisconnected,

    #[serde(rename = "StrangerTyping")]
    StrangerTyping,

    #[serde(rename = "StrangerStoppedTyping")]
    StrangerStoppedTyping,

    /// Latency is the elapsed time of the poll that delivered the message.
    #[serde(rename = "MessageReceived")]
    MessageReceived(Message),

    /// Text as given by the caller; latency includes the send exchange.
    #[serde(rename = "MessageSent")]
    MessageSent(Message),

    /// Text exactly as transmitted (after any encoding).
    #[serde(rename = "RawMessageSent")]
    RawMessageSent(Message),

    /// The count is the value stored for the server after the update, which is the
    /// previous value when the relay sent something unparseable.
    #[serde(rename = "UserCountUpdated")]
    UserCountUpdated { server_index: usize, count: u64 },

    #[serde(rename = "CaptchaRequired")]
    CaptchaRequired { challenge_id: String },

    #[serde(rename = "CaptchaRejected")]
    CaptchaRejected,

    /// A record the session does not act on, passed through verbatim.
    #[serde(rename = "Unhandled")]
    Unhandled { record: serde_json::Value },
}

/// Lifecycle notifications of a single responder instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum ProcessingEvent {
    #[serde(rename = "Started")]
    Started(Message),

    #[serde(rename = "Finished")]
    Finished(Message),

    /// The backend exchange failed or panicked; the responder is idle again.
    #[serde(rename = "Failed")]
    Failed { input: Message, error: String },
}
