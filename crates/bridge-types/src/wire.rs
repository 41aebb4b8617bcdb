//! # Wire Encoding
//!
//! Well-known channel names and the byte encoding used across the process
//! boundary. Each message kind travels on its own channel, with a dedicated
//! reply channel per request kind; names are namespaced so they cannot
//! collide with application-level channels.

use crate::envelope::{Envelope, MessageKind};
use crate::errors::BridgeError;
use crate::reply::Reply;

/// Well-known channel names.
pub mod topics {
    /// One-way events, fire-and-forget.
    pub const EVENTS: &str = "bridge.ipc.events";
    /// Commands awaiting at most one outcome.
    pub const COMMANDS: &str = "bridge.ipc.commands";
    /// Replies settling forwarded commands.
    pub const COMMAND_REPLIES: &str = "bridge.ipc.commands.reply";
    /// Queries awaiting exactly one reply.
    pub const QUERIES: &str = "bridge.ipc.queries";
    /// Replies settling forwarded queries.
    pub const QUERY_REPLIES: &str = "bridge.ipc.queries.reply";
}

/// Channel carrying outbound envelopes of `kind`.
#[must_use]
pub fn topic_for(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Event => topics::EVENTS,
        MessageKind::Command => topics::COMMANDS,
        MessageKind::Query => topics::QUERIES,
    }
}

/// Channel carrying replies for requests of `kind`; `None` for events.
#[must_use]
pub fn reply_topic_for(kind: MessageKind) -> Option<&'static str> {
    match kind {
        MessageKind::Event => None,
        MessageKind::Command => Some(topics::COMMAND_REPLIES),
        MessageKind::Query => Some(topics::QUERY_REPLIES),
    }
}

/// Message kind carried by `topic`, if it is one of the bridge's envelope
/// channels.
#[must_use]
pub fn kind_for_topic(topic: &str) -> Option<MessageKind> {
    match topic {
        topics::EVENTS => Some(MessageKind::Event),
        topics::COMMANDS => Some(MessageKind::Command),
        topics::QUERIES => Some(MessageKind::Query),
        _ => None,
    }
}

/// Request kind whose replies travel on `topic`, if any.
#[must_use]
pub fn reply_kind_for_topic(topic: &str) -> Option<MessageKind> {
    match topic {
        topics::COMMAND_REPLIES => Some(MessageKind::Command),
        topics::QUERY_REPLIES => Some(MessageKind::Query),
        _ => None,
    }
}

/// Encode an envelope for the channel.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, BridgeError> {
    serde_json::to_vec(envelope).map_err(|e| BridgeError::Serialization(e.to_string()))
}

/// Decode an envelope received from the channel.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, BridgeError> {
    serde_json::from_slice(bytes).map_err(|e| BridgeError::Decode(e.to_string()))
}

/// Encode a reply for the channel.
pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>, BridgeError> {
    serde_json::to_vec(reply).map_err(|e| BridgeError::Serialization(e.to_string()))
}

/// Decode a reply received from the channel.
pub fn decode_reply(bytes: &[u8]) -> Result<Reply, BridgeError> {
    serde_json::from_slice(bytes).map_err(|e| BridgeError::Decode(e.to_string()))
}
