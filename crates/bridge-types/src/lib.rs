//! # Bridge Types
//!
//! Shared message types for the cross-process bus bridge: message identity,
//! the wire envelope, replies, well-known channel names, and the error
//! taxonomy.
//!
//! ## Correlation Rules
//!
//! - Every envelope carries a globally unique `messageId`, assigned once at
//!   construction.
//! - A reply reuses the originating request's id; that pair is the only case
//!   where two wire records share an id.
//! - Unserializable payloads fail at construction, before anything is sent.
//!
//! ## Module Structure
//!
//! ```text
//! bridge-types/
//! ├── id.rs        # MessageId (UUID v7)
//! ├── envelope.rs  # Headers, MessageKind, Envelope
//! ├── reply.rs     # Outcome, Reply
//! ├── wire.rs      # Channel names, encode/decode
//! └── errors.rs    # BridgeError
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod errors;
pub mod id;
pub mod reply;
pub mod wire;

// Re-export main types
pub use envelope::{Envelope, Headers, MessageKind};
pub use errors::BridgeError;
pub use id::MessageId;
pub use reply::{Outcome, Reply};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
