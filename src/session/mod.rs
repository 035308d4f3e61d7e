//! 会话模块：连接生命周期、事件轮询与状态。
//!
//! A [`SessionClient`] owns one relay session at a time. `connect` claims a server from the
//! shared [`ServerPool`](crate::relay::ServerPool), starts a background poll loop and
//! publishes [`SessionEvent`](crate::types::SessionEvent)s to every subscriber.

mod builder;
mod client;
mod poll;
mod state;

pub use builder::{SessionClientBuilder, DEFAULT_EVENT_CAPACITY};
pub use client::SessionClient;
pub use state::{ConnectionStatus, SessionState, StrangerPresence};
