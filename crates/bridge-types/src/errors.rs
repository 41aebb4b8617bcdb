//! # Error Taxonomy
//!
//! Every failure the bridge can produce, local or cross-process. Nothing
//! crosses the process boundary as a raised error: each of these is
//! converted into a `Failure` outcome, an observer emission, or both before
//! it reaches a caller.

use crate::id::MessageId;
use thiserror::Error;

/// Bridge error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A message type must be a non-empty string.
    #[error("message type must not be empty")]
    EmptyMessageType,

    /// The payload is not representable on the wire; nothing was sent.
    #[error("payload not serializable: {0}")]
    Serialization(String),

    /// Bytes received from the channel did not decode as a bridge frame.
    #[error("undecodable frame: {0}")]
    Decode(String),

    /// No local handler is registered for an inbound command or query.
    /// Recoverable: replied as a failure to the remote caller.
    #[error("handler not found for {message_type}")]
    HandlerNotFound {
        /// The message type that had no handler.
        message_type: String,
    },

    /// A local handler returned an error. Recoverable: replied as a failure.
    #[error("handler for {message_type} failed: {reason}")]
    HandlerFailed {
        /// The message type whose handler failed.
        message_type: String,
        /// The handler's error text.
        reason: String,
    },

    /// A second handler was registered for a type that already has one.
    /// Surfaced at registration time, not at dispatch time.
    #[error("handler already registered for {message_type}")]
    DuplicateHandler {
        /// The contested message type.
        message_type: String,
    },

    /// The channel write failed; the pending entry settles immediately
    /// instead of waiting for a reply that will never come.
    #[error("forward failed: {0}")]
    ForwardFailed(String),

    /// A reply arrived for an id that is not pending (never registered,
    /// already settled, or expired). Observed and ignored, never fatal.
    #[error("stale or unknown reply for {id}")]
    StaleReply {
        /// The id the reply claimed to settle.
        id: MessageId,
    },

    /// No reply arrived within the deadline.
    #[error("timed out after {waited_ms}ms")]
    Timeout {
        /// How long the entry waited before expiring.
        waited_ms: u64,
    },

    /// The gateway was disposed; no new forwarding work is accepted and
    /// pending requests are cancelled.
    #[error("gateway disposed")]
    Disposed,

    /// The correlation table is at capacity.
    #[error("pending request limit reached ({limit})")]
    PendingLimitReached {
        /// The configured bound.
        limit: usize,
    },

    /// The channel or an internal queue closed underneath an operation.
    #[error("channel closed")]
    ChannelClosed,
}
