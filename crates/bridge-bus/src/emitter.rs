//! # Gateway Observer
//!
//! Append-only listener registry broadcasting lifecycle and failure
//! notifications. Failures never cross the process boundary as raised
//! errors; they land here instead, decoupled from their call sites.
//!
//! The set of observation names is a stable public contract: external
//! listeners subscribe by name, so no name may be removed or repurposed.

use bridge_types::{BridgeError, Envelope};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// A notification pushed to observer listeners.
#[derive(Debug, Clone)]
pub enum Observation {
    /// A local command handler returned an error.
    CommandHandlerFailed {
        /// The command whose handler failed.
        command: Envelope,
        /// What went wrong.
        error: BridgeError,
    },
    /// No local handler was registered for a command.
    CommandHandlerNotFound {
        /// The lookup failure.
        error: BridgeError,
    },
    /// A command could not be written to the channel.
    CommandForwardFailed {
        /// The command that was not forwarded.
        command: Envelope,
        /// The write failure.
        error: BridgeError,
    },
    /// A local query handler returned an error.
    QueryHandlerFailed {
        /// The query whose handler failed.
        query: Envelope,
        /// What went wrong.
        error: BridgeError,
    },
    /// No local handler was registered for a query.
    QueryHandlerNotFound {
        /// The lookup failure.
        error: BridgeError,
    },
    /// A query could not be written to the channel.
    QueryForwardFailed {
        /// The query that was not forwarded.
        query: Envelope,
        /// The write failure.
        error: BridgeError,
    },
    /// An event listener failed, or an event arrived with no listener.
    EventListenerFailed {
        /// The event in question.
        event: Envelope,
        /// What went wrong.
        error: BridgeError,
    },
    /// An event could not be written to the channel.
    EventForwardFailed {
        /// The event that was not forwarded.
        event: Envelope,
        /// The write failure.
        error: BridgeError,
    },
}

impl Observation {
    /// Every canonical observation name.
    pub const NAMES: [&'static str; 8] = [
        "command_handler_failed",
        "command_handler_not_found",
        "command_forward_failed",
        "query_handler_failed",
        "query_handler_not_found",
        "query_forward_failed",
        "event_listener_failed",
        "event_forward_failed",
    ];

    /// Canonical snake_case name, stable across releases.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CommandHandlerFailed { .. } => "command_handler_failed",
            Self::CommandHandlerNotFound { .. } => "command_handler_not_found",
            Self::CommandForwardFailed { .. } => "command_forward_failed",
            Self::QueryHandlerFailed { .. } => "query_handler_failed",
            Self::QueryHandlerNotFound { .. } => "query_handler_not_found",
            Self::QueryForwardFailed { .. } => "query_forward_failed",
            Self::EventListenerFailed { .. } => "event_listener_failed",
            Self::EventForwardFailed { .. } => "event_forward_failed",
        }
    }

    /// The error carried by this observation.
    #[must_use]
    pub fn error(&self) -> &BridgeError {
        match self {
            Self::CommandHandlerFailed { error, .. }
            | Self::CommandHandlerNotFound { error }
            | Self::CommandForwardFailed { error, .. }
            | Self::QueryHandlerFailed { error, .. }
            | Self::QueryHandlerNotFound { error }
            | Self::QueryForwardFailed { error, .. }
            | Self::EventListenerFailed { error, .. }
            | Self::EventForwardFailed { error, .. } => error,
        }
    }

    /// The envelope carried by this observation, where the contract
    /// includes one.
    #[must_use]
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::CommandHandlerFailed { command, .. }
            | Self::CommandForwardFailed { command, .. } => Some(command),
            Self::QueryHandlerFailed { query, .. } | Self::QueryForwardFailed { query, .. } => {
                Some(query)
            }
            Self::EventListenerFailed { event, .. } | Self::EventForwardFailed { event, .. } => {
                Some(event)
            }
            Self::CommandHandlerNotFound { .. } | Self::QueryHandlerNotFound { .. } => None,
        }
    }
}

/// Listener callback invoked on emission.
pub type ObservationListener = Arc<dyn Fn(&Observation) + Send + Sync>;

/// Append-only observer registry.
///
/// Listeners registered under the same name are invoked in insertion order.
/// A panicking listener is isolated and does not affect delivery to the
/// rest. There is no way to remove a listener.
#[derive(Default)]
pub struct GatewayObserver {
    listeners: RwLock<Vec<(String, ObservationListener)>>,
}

impl GatewayObserver {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for a canonical observation name. Never fails.
    pub fn on(
        &self,
        name: impl Into<String>,
        listener: impl Fn(&Observation) + Send + Sync + 'static,
    ) {
        self.listeners
            .write()
            .push((name.into(), Arc::new(listener)));
    }

    /// Invoke every listener registered for this observation's name.
    pub fn emit(&self, observation: Observation) {
        let name = observation.name();
        let targets: Vec<ObservationListener> = self
            .listeners
            .read()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, l)| Arc::clone(l))
            .collect();
        debug!(name, listeners = targets.len(), error = %observation.error(), "observation");
        for listener in targets {
            if catch_unwind(AssertUnwindSafe(|| listener(&observation))).is_err() {
                warn!(name, "observer listener panicked; continuing delivery");
            }
        }
    }

    /// Number of listeners registered for a name.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.read().iter().filter(|(n, _)| n == name).count()
    }
}

/// Forward every canonical observation to `tracing`.
///
/// Handler failures log at `error`, missing handlers at `debug`, forward
/// failures at `trace`. Useful when no bespoke listeners are installed but
/// failures still need to land somewhere visible.
pub fn install_tracing_bridge(observer: &GatewayObserver) {
    for name in Observation::NAMES {
        observer.on(name, |observation| {
            let identifier = observation
                .envelope()
                .map(|e| format!("{}/{}", e.message_type(), e.id()))
                .unwrap_or_default();
            match observation {
                Observation::CommandHandlerFailed { error, .. }
                | Observation::QueryHandlerFailed { error, .. }
                | Observation::EventListenerFailed { error, .. } => {
                    error!(message = %identifier, %error, "handler failed");
                }
                Observation::CommandHandlerNotFound { error }
                | Observation::QueryHandlerNotFound { error } => {
                    debug!(%error, "handler not found");
                }
                Observation::CommandForwardFailed { error, .. }
                | Observation::QueryForwardFailed { error, .. }
                | Observation::EventForwardFailed { error, .. } => {
                    trace!(message = %identifier, %error, "forward failed");
                }
            }
        });
    }
}
