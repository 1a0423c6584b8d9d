//! Push-channel message definitions.
//!
//! Inbound frames are JSON objects of the shape
//! `{ "type"?: string, "data"?: any, "timestamp"?: number }`. Every field is
//! optional on the wire; [`decode_inbound`] fills the gaps so subscribers
//! always see a complete [`PushMessage`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtoError;

/// Discriminator of heartbeat requests sent by the client.
pub const PING_TYPE: &str = "ping";
/// Discriminator of heartbeat replies. Never delivered to subscribers.
pub const PONG_TYPE: &str = "pong";
/// Discriminator used when the envelope carries none.
pub const DEFAULT_MESSAGE_TYPE: &str = "message";
/// Discriminator of match notifications.
pub const MATCH_TYPE: &str = "match";
/// Discriminator of system announcements.
pub const SYSTEM_TYPE: &str = "system";

/// Raw inbound envelope, extracted leniently from a parsed JSON value.
///
/// A field of the wrong JSON type is treated as absent rather than as a
/// decoding failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    /// Wire discriminator.
    pub kind: Option<String>,
    /// Payload.
    pub data: Option<Value>,
    /// Sender timestamp in milliseconds since the Unix epoch.
    pub timestamp: Option<i64>,
}

impl Envelope {
    /// Extract the envelope fields from a parsed JSON value.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(fields) = value else {
            return Self::default();
        };

        Self {
            kind: fields
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_owned),
            data: fields.get("data").filter(|data| !data.is_null()).cloned(),
            timestamp: fields.get("timestamp").and_then(|ts| {
                ts.as_i64().or_else(|| ts.as_f64().map(|millis| millis as i64))
            }),
        }
    }

    /// Whether this envelope is a heartbeat reply.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.kind.as_deref() == Some(PONG_TYPE)
    }

    /// Normalize into a [`PushMessage`].
    ///
    /// `raw` is the whole parsed envelope and becomes the payload when the
    /// envelope has no `data`; `now_ms` stands in for a missing timestamp.
    #[must_use]
    pub fn into_message(self, raw: Value, now_ms: i64) -> PushMessage {
        PushMessage {
            kind: self
                .kind
                .unwrap_or_else(|| DEFAULT_MESSAGE_TYPE.to_string()),
            data: self.data.unwrap_or(raw),
            timestamp: self.timestamp.unwrap_or(now_ms),
        }
    }
}

/// A normalized message as delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    /// Message discriminator (`message`, `match`, `system`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Message payload.
    pub data: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl PushMessage {
    /// Create a message.
    #[must_use]
    pub fn new(kind: impl Into<String>, data: Value, timestamp: i64) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp,
        }
    }

    /// A direct message between users.
    #[must_use]
    pub fn is_chat(&self) -> bool {
        self.kind == DEFAULT_MESSAGE_TYPE
    }

    /// A match notification.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.kind == MATCH_TYPE
    }

    /// A system announcement.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.kind == SYSTEM_TYPE
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encoding(e.to_string()))
    }
}

/// Result of decoding one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Heartbeat reply, consumed by the connection itself.
    Heartbeat,
    /// Message for subscribers.
    Message(PushMessage),
}

/// Decode an inbound text frame.
///
/// # Errors
///
/// Returns [`ProtoError::Decoding`] if `text` is not valid JSON.
pub fn decode_inbound(text: &str, now_ms: i64) -> Result<Inbound, ProtoError> {
    let raw: Value =
        serde_json::from_str(text).map_err(|e| ProtoError::Decoding(e.to_string()))?;
    let envelope = Envelope::from_value(&raw);

    if envelope.is_heartbeat() {
        return Ok(Inbound::Heartbeat);
    }

    Ok(Inbound::Message(envelope.into_message(raw, now_ms)))
}

/// The heartbeat request frame.
#[must_use]
pub fn ping_frame() -> String {
    format!(r#"{{"type":"{PING_TYPE}"}}"#)
}

/// Encode an outbound payload as wire text.
///
/// A payload that serializes to a JSON string is sent verbatim; anything
/// else is sent as compact JSON.
///
/// # Errors
///
/// Returns [`ProtoError::Encoding`] if the payload cannot be represented as JSON.
pub fn encode_payload<T: Serialize + ?Sized>(payload: &T) -> Result<String, ProtoError> {
    match serde_json::to_value(payload).map_err(|e| ProtoError::Encoding(e.to_string()))? {
        Value::String(text) => Ok(text),
        other => Ok(other.to_string()),
    }
}
