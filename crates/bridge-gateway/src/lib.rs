//! # Bridge Gateway
//!
//! The cross-process side of the bridge: the duplex channel abstraction, the
//! correlation table tracking in-flight requests, the per-kind forwarders,
//! and the gateway facade that owns them all behind a single disposal
//! operation.
//!
//! ## Control Flow
//!
//! ```text
//! [LocalBus] ──tap──→ [Forwarder] ──encode──→ [Channel] ─ ─ ─→ peer
//!     ↑                    │
//!     │ dispatch_inbound   │ register/settle
//!     │                    ↓
//! [Forwarder] ←──decode── [Channel] ←─ ─ ─ peer    [PendingStore]
//! ```
//!
//! A locally observed message is serialized and written to the channel; the
//! remote forwarder dispatches it and, for commands and queries, writes one
//! reply back carrying the same id. The originating side matches the reply
//! against the correlation table and settles the caller exactly once —
//! by reply, timeout, or disposal, whichever comes first.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
mod forwarder;
pub mod gateway;
pub mod pending;

// Re-export main types
pub use channel::{Channel, InMemoryChannel, InboundFrame};
pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use pending::{PendingStats, PendingStore, SettleReason};
