//! # pushlink-proto
//!
//! Wire format for the pushlink notification channel: inbound envelope
//! decoding and normalization, heartbeat frames and outbound payload encoding.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod messages;

pub use error::ProtoError;
pub use messages::{
    decode_inbound, encode_payload, ping_frame, Envelope, Inbound, PushMessage,
    DEFAULT_MESSAGE_TYPE, MATCH_TYPE, PING_TYPE, PONG_TYPE, SYSTEM_TYPE,
};
