//! # Message Envelope
//!
//! The canonical wire representation of an event, command, or query plus its
//! correlation metadata. Envelopes are immutable: the id is assigned once at
//! construction and never reassigned.

use crate::errors::BridgeError;
use crate::id::MessageId;
use crate::reply::{Outcome, Reply};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three logical message kinds carried by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// One-way, fire-and-forget, zero or more subscribers.
    Event,
    /// Fire, expect at most one outcome.
    Command,
    /// Fire, expect exactly one reply.
    Query,
}

impl MessageKind {
    /// Whether a message of this kind awaits a correlated reply.
    #[must_use]
    pub fn expects_reply(self) -> bool {
        matches!(self, Self::Command | Self::Query)
    }

    /// Lowercase label, matching the wire encoding.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Command => "command",
            Self::Query => "query",
        }
    }
}

/// Routing and correlation headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Headers {
    /// Logical message kind identifier, used for handler lookup.
    pub message_type: String,
    /// Globally unique id; the sole correlation key.
    pub message_id: MessageId,
}

/// Immutable record wrapping a serializable payload with its headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Routing and correlation headers.
    pub headers: Headers,
    /// The message kind.
    pub kind: MessageKind,
    /// Opaque business data.
    pub payload: Value,
}

impl Envelope {
    /// Build an event envelope with a fresh id.
    pub fn event(message_type: impl Into<String>, payload: impl Serialize) -> Result<Self, BridgeError> {
        Self::new(MessageKind::Event, message_type, payload)
    }

    /// Build a command envelope with a fresh id.
    pub fn command(message_type: impl Into<String>, payload: impl Serialize) -> Result<Self, BridgeError> {
        Self::new(MessageKind::Command, message_type, payload)
    }

    /// Build a query envelope with a fresh id.
    pub fn query(message_type: impl Into<String>, payload: impl Serialize) -> Result<Self, BridgeError> {
        Self::new(MessageKind::Query, message_type, payload)
    }

    /// Build an envelope of any kind with a fresh id.
    ///
    /// Fails fast on an empty message type or an unserializable payload —
    /// nothing is ever forwarded partially.
    pub fn new(
        kind: MessageKind,
        message_type: impl Into<String>,
        payload: impl Serialize,
    ) -> Result<Self, BridgeError> {
        Self::with_id(kind, message_type, MessageId::new(), payload)
    }

    /// Build an envelope reusing an existing id.
    pub fn with_id(
        kind: MessageKind,
        message_type: impl Into<String>,
        message_id: MessageId,
        payload: impl Serialize,
    ) -> Result<Self, BridgeError> {
        let message_type = message_type.into();
        if message_type.is_empty() {
            return Err(BridgeError::EmptyMessageType);
        }
        let payload =
            serde_json::to_value(payload).map_err(|e| BridgeError::Serialization(e.to_string()))?;
        Ok(Self {
            headers: Headers {
                message_type,
                message_id,
            },
            kind,
            payload,
        })
    }

    /// The message type used for handler lookup.
    #[must_use]
    pub fn message_type(&self) -> &str {
        &self.headers.message_type
    }

    /// The correlation id.
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.headers.message_id
    }

    /// Deserialize the payload into a concrete type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, BridgeError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| BridgeError::Serialization(e.to_string()))
    }

    /// Build the reply that settles this envelope, carrying the *same* id.
    #[must_use]
    pub fn reply_with(&self, outcome: Outcome) -> Reply {
        Reply {
            in_reply_to: self.id(),
            outcome,
        }
    }
}
