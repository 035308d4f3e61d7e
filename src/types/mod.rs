//! 类型模块：消息与通知事件。
//!
//! # Types Module
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat line plus latency metadata |
//! | [`SessionEvent`] | Notifications emitted by a session client |
//! | [`ProcessingEvent`] | Lifecycle notifications of a responder |
//!
//! ## Example
//!
//! ```rust
//! use relay_chat::types::{Message, SessionEvent};
//!
//! let msg = Message::new("hi", 120);
//! let event = SessionEvent::MessageReceived(msg.clone());
//! assert_eq!(event, SessionEvent::MessageReceived(Message::new("hi", 120)));
//! ```

pub mod events;
pub mod message;

pub use events::{ProcessingEvent, SessionEvent};
pub use message::Message;
