//! Poll batch decoder (response body -> RelayEvent)
//!
//! Decoding is purely syntactic. A batch is a JSON array of records shaped
//! `[tag, ...fields]`; the tag picks the variant and fields are read positionally.
//! Nothing in a well-formed batch makes decoding fail: unknown tags and records that
//! are missing a required field come back as [`RelayEvent::Unhandled`].

use crate::{Error, ErrorContext, Result};
use serde_json::Value;

/// One record of a poll batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A stranger was paired with this session.
    Connected,
    StrangerDisconnected,
    MessageReceived(String),
    Waiting,
    Typing,
    StoppedTyping,
    /// `None` when the relay sent a count that does not parse as an integer.
    UserCount(Option<u64>),
    /// Carries the challenge id to answer with `send_captcha_response`.
    CaptchaRequired(String),
    CaptchaRejected,
    Unhandled(Value),
}

/// Tags the relay is known to send but that have no typed variant.
pub const PASSTHROUGH_TAGS: &[&str] = &[
    "error",
    "suggestSpyee",
    "spyTyping",
    "spyStoppedTyping",
    "spyDisconnected",
    "question",
];

pub struct EventDecoder;

impl EventDecoder {
    /// True for bodies that mean "nothing happened this cycle".
    pub fn is_empty_body(raw: &str) -> bool {
        let t = raw.trim();
        t.is_empty() || t.eq_ignore_ascii_case("null")
    }

    /// Decode a raw poll response body.
    ///
    /// Empty bodies, `null` and `[]` give an empty batch. A body that is not a JSON array
    /// is a [`Error::Decode`].
    pub fn decode(raw: &str) -> Result<Vec<RelayEvent>> {
        if Self::is_empty_body(raw) {
            return Ok(Vec::new());
        }
        let value: Value = serde_json::from_str(raw.trim()).map_err(|e| {
            Error::decode_with_context(
                format!("poll body is not valid JSON: {}", e),
                ErrorContext::new()
                    .with_details(truncate(raw, 120))
                    .with_source("event_decoder"),
            )
        })?;
        Self::decode_value(&value)
    }

    pub fn decode_value(batch: &Value) -> Result<Vec<RelayEvent>> {
        match batch {
            Value::Null => Ok(Vec::new()),
            Value::Array(records) => Ok(records.iter().map(Self::decode_record).collect()),
            other => Err(Error::decode_with_context(
                "poll body is not an array of event records",
                ErrorContext::new()
                    .with_details(format!("found {}", kind(other)))
                    .with_source("event_decoder"),
            )),
        }
    }

    /// Map a single `[tag, ...fields]` record to its variant.
    pub fn decode_record(record: &Value) -> RelayEvent {
        let Some(tag) = record.get(0).and_then(Value::as_str) else {
            return RelayEvent::Unhandled(record.clone());
        };
        let field = |i: usize| record.get(i).filter(|v| !v.is_null());

        match tag {
            "connected" => RelayEvent::Connected,
            "strangerDisconnected" => RelayEvent::StrangerDisconnected,
            "gotMessage" => match field(1) {
                Some(v) => RelayEvent::MessageReceived(text_of(v)),
                None => RelayEvent::Unhandled(record.clone()),
            },
            "waiting" => RelayEvent::Waiting,
            "typing" => RelayEvent::Typing,
            "stoppedTyping" => RelayEvent::StoppedTyping,
            "count" => RelayEvent::UserCount(field(1).and_then(parse_count)),
            "recaptchaRequired" => match field(1) {
                Some(v) => RelayEvent::CaptchaRequired(text_of(v)),
                None => RelayEvent::Unhandled(record.clone()),
            },
            "recaptchaRejected" => RelayEvent::CaptchaRejected,
            _ => RelayEvent::Unhandled(record.clone()),
        }
    }
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_count(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
