//! # relay-chat
//!
//! 匿名配对聊天中继的会话客户端，以及单飞（single-flight）对话应答器。
//!
//! Session client for anonymous-pairing chat relays, plus a single-flight
//! "responder" abstraction that produces replies paced like a human typist.
//!
//! ## Overview
//!
//! A [`SessionClient`] connects to one server of a [`ServerPool`], keeps a polling loop
//! running against it, and turns every polled record into a typed [`SessionEvent`]
//! delivered over a broadcast channel. A [`Responder`] (usually a [`Chatbot`] wrapping a
//! [`Backend`] adapter) produces replies, and guarantees that at most one reply is
//! being produced per instance at any time. The [`Orchestrator`] wires the two together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relay_chat::{SessionClient, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> relay_chat::Result<()> {
//!     let client = SessionClient::builder().build()?;
//!     let mut events = client.subscribe();
//!
//!     client.connect(None).await?;
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             SessionEvent::MessageReceived(msg) => {
//!                 client.send_message(&format!("you said: {}", msg.text), 0).await?;
//!             }
//!             SessionEvent::Disconnected => break,
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | Session lifecycle, polling loop, outbound actions |
//! | [`relay`] | Poll batch decoding and the shared server pool |
//! | [`responder`] | Single-flight responder contract and backend adapters |
//! | [`orchestrator`] | Glue between a session and a responder |
//! | [`typing`] | Human typing latency model |
//! | [`transport`] | Form-POST transport capability and its reqwest implementation |
//! | [`types`] | Messages and notification events |
//! | [`config`] | Relay configuration (YAML + environment) |
//! | [`logging`] | tracing subscriber setup |

pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod relay;
pub mod responder;
pub mod session;
pub mod transport;
pub mod types;
pub mod typing;

pub use config::RelayConfig;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use relay::{EventDecoder, RelayEvent, ServerPool};
pub use responder::{Backend, Chatbot, Responder};
pub use session::{SessionClient, SessionClientBuilder};
pub use transport::{FormFields, HttpTransport, Transport, TransportError};
pub use types::{Message, ProcessingEvent, SessionEvent};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
