//! # Bridge Bus
//!
//! The in-process side of the cross-process bridge: event listeners,
//! command/query dispatch, the outgoing taps a forwarder observes, and the
//! observer every failure is pushed through.
//!
//! ## Delivery Rules
//!
//! - Events: zero or more listeners, best-effort; a failing listener never
//!   fails the publisher.
//! - Commands/queries: exactly one handler per type, conflicts rejected at
//!   registration; dispatch never raises.
//! - Inbound traffic (from the channel) bypasses the outgoing taps, so a
//!   mirrored message is never mirrored back.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod emitter;
pub mod listeners;
pub mod local;

// Re-export main types
pub use dispatch::{handler_fn, DispatchRegistry, FnHandler, RequestHandler};
pub use emitter::{install_tracing_bridge, GatewayObserver, Observation, ObservationListener};
pub use listeners::{listener_fn, DeliveryReport, EventListener, FnListener, ListenerRegistry};
pub use local::{BusStats, ForwardRequest, LocalBus};

/// Default capacity for the outgoing taps.
pub const DEFAULT_TAP_CAPACITY: usize = 256;
