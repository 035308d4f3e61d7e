//! 中继协议模块：事件批次解码与服务器池。
//!
//! # Relay Protocol
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`EventDecoder`] | Poll response body to [`RelayEvent`]s |
//! | [`ServerPool`] | Server list, rotating cursor, per-server user counts |
//! | [`action`] | URL path suffixes of the relay endpoints |

pub mod decode;
pub mod pool;

pub use decode::{EventDecoder, RelayEvent};
pub use pool::{ServerPool, ServerPoolSnapshot};

/// Relay endpoint names, appended to the server URL.
pub mod action {
    pub const START: &str = "start";
    pub const DISCONNECT: &str = "disconnect";
    pub const TYPING: &str = "typing";
    pub const STOPPED_TYPING: &str = "stoppedtyping";
    pub const SEND: &str = "send";
    pub const RECAPTCHA: &str = "recaptcha";
    pub const EVENTS: &str = "events";
}
