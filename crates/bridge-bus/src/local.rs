//! # Local Bus Adapter
//!
//! Uniform facade over the in-process buses: best-effort event publishing,
//! single-handler command/query dispatch, and the outgoing taps a forwarder
//! observes.
//!
//! Loop prevention: envelopes received from the channel enter through
//! [`LocalBus::dispatch_inbound`], which bypasses the outgoing taps. Without
//! that split, two symmetric endpoints would mirror the same message back
//! and forth forever.

use crate::dispatch::{DispatchRegistry, RequestHandler};
use crate::emitter::{GatewayObserver, Observation};
use crate::listeners::{EventListener, ListenerRegistry};
use bridge_types::{BridgeError, Envelope, MessageKind, Outcome, Reply};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// A command or query handed to the forwarder, with the caller's completion.
pub struct ForwardRequest {
    /// The request envelope.
    pub envelope: Envelope,
    /// Settled exactly once by reply, timeout, write failure, or disposal.
    pub completion: oneshot::Sender<Outcome>,
}

/// Counters for bus activity.
#[derive(Debug, Default)]
pub struct BusStats {
    /// Events published locally.
    pub events_published: AtomicU64,
    /// Listener deliveries that completed.
    pub events_delivered: AtomicU64,
    /// Listener deliveries that failed.
    pub listener_failures: AtomicU64,
    /// Commands and queries dispatched to local handlers.
    pub requests_dispatched: AtomicU64,
    /// Commands and queries handed to the forwarder.
    pub requests_forwarded: AtomicU64,
}

/// The in-process bus adapter.
///
/// Holds a non-owning reference to nothing: listeners and handlers are
/// registered directly on it, and the observer is injected so every
/// component that needs to emit shares the same one.
pub struct LocalBus {
    observer: Arc<GatewayObserver>,
    listeners: ListenerRegistry,
    commands: DispatchRegistry,
    queries: DispatchRegistry,
    event_tap: Mutex<Option<mpsc::Sender<Envelope>>>,
    command_tap: Mutex<Option<mpsc::Sender<ForwardRequest>>>,
    query_tap: Mutex<Option<mpsc::Sender<ForwardRequest>>>,
    stats: BusStats,
}

impl LocalBus {
    /// Create a bus emitting through `observer`.
    #[must_use]
    pub fn new(observer: Arc<GatewayObserver>) -> Self {
        Self {
            observer,
            listeners: ListenerRegistry::new(),
            commands: DispatchRegistry::new(MessageKind::Command),
            queries: DispatchRegistry::new(MessageKind::Query),
            event_tap: Mutex::new(None),
            command_tap: Mutex::new(None),
            query_tap: Mutex::new(None),
            stats: BusStats::default(),
        }
    }

    /// The observer this bus emits through.
    #[must_use]
    pub fn observer(&self) -> &Arc<GatewayObserver> {
        &self.observer
    }

    /// Bus activity counters.
    #[must_use]
    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    /// Register an additional listener for an event type.
    pub fn add_listener(&self, message_type: impl Into<String>, listener: Arc<dyn EventListener>) {
        self.listeners.add(message_type, listener);
    }

    /// Register the single command handler for a type. A second
    /// registration for the same type is rejected.
    pub fn register_command_handler(
        &self,
        message_type: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), BridgeError> {
        self.commands.register(message_type, handler)
    }

    /// Register the single query handler for a type. A second registration
    /// for the same type is rejected.
    pub fn register_query_handler(
        &self,
        message_type: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), BridgeError> {
        self.queries.register(message_type, handler)
    }

    /// Publish an event: best-effort local delivery, then mirror outward.
    ///
    /// Never fails the caller. Every listener failure is emitted as
    /// `event_listener_failed`; a missing or closed tap means no bridge is
    /// attached and the event stays local.
    pub async fn publish(&self, event: Envelope) {
        debug_assert_eq!(event.kind, MessageKind::Event);
        self.stats.events_published.fetch_add(1, Ordering::Relaxed);

        let report = self.listeners.deliver(&event).await;
        self.stats
            .events_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        for failure in report.failures {
            self.stats.listener_failures.fetch_add(1, Ordering::Relaxed);
            self.observer.emit(Observation::EventListenerFailed {
                event: event.clone(),
                error: BridgeError::HandlerFailed {
                    message_type: event.message_type().to_string(),
                    reason: failure.reason,
                },
            });
        }

        let tap = self.event_tap.lock().clone();
        if let Some(tap) = tap {
            if tap.send(event).await.is_err() {
                debug!("event tap closed; event stays local");
            }
        }
    }

    /// Send a command and await its outcome.
    ///
    /// Dispatched locally when a handler is registered; otherwise handed to
    /// the forwarder. Exactly one of reply, timeout, write failure, or
    /// disposal settles the returned outcome.
    pub async fn send_command(&self, command: Envelope) -> Outcome {
        self.send_request(command, MessageKind::Command).await
    }

    /// Send a query and await its reply.
    pub async fn send_query(&self, query: Envelope) -> Outcome {
        self.send_request(query, MessageKind::Query).await
    }

    async fn send_request(&self, request: Envelope, kind: MessageKind) -> Outcome {
        let registry = self.registry_for(kind);

        // Local-first: a registered handler wins, and the request is never
        // also forwarded (duplicate-delivery guard).
        if registry.has_handler(request.message_type()) {
            self.stats.requests_dispatched.fetch_add(1, Ordering::Relaxed);
            return self.dispatch_and_observe(registry, &request, kind).await;
        }

        let tap = self.request_tap_for(kind).lock().clone();
        if let Some(tap) = tap {
            let (completion, settled) = oneshot::channel();
            let forward = ForwardRequest {
                envelope: request.clone(),
                completion,
            };
            if tap.send(forward).await.is_ok() {
                self.stats.requests_forwarded.fetch_add(1, Ordering::Relaxed);
                return match settled.await {
                    Ok(outcome) => outcome,
                    // The forwarder dropped the completion without settling:
                    // the gateway is tearing down.
                    Err(_) => Outcome::failure(BridgeError::Disposed.to_string()),
                };
            }
        }

        // No handler and no bridge: fail here, observably.
        let error = BridgeError::HandlerNotFound {
            message_type: request.message_type().to_string(),
        };
        self.observer.emit(match kind {
            MessageKind::Command => Observation::CommandHandlerNotFound {
                error: error.clone(),
            },
            _ => Observation::QueryHandlerNotFound {
                error: error.clone(),
            },
        });
        Outcome::failure(error.to_string())
    }

    /// Dispatch an envelope received from the channel.
    ///
    /// Inbound traffic never touches the outgoing taps. Commands and
    /// queries always produce exactly one reply carrying the request's id —
    /// a dispatch failure becomes a `Failure` reply, never a dropped one.
    /// Events produce no reply; an event with no listener is reported but
    /// is not a protocol error (events are optional-subscriber by design).
    pub async fn dispatch_inbound(&self, envelope: Envelope) -> Option<Reply> {
        match envelope.kind {
            MessageKind::Event => {
                let report = self.listeners.deliver(&envelope).await;
                if !report.had_listeners() {
                    self.observer.emit(Observation::EventListenerFailed {
                        event: envelope.clone(),
                        error: BridgeError::HandlerNotFound {
                            message_type: envelope.message_type().to_string(),
                        },
                    });
                }
                for failure in report.failures {
                    self.stats.listener_failures.fetch_add(1, Ordering::Relaxed);
                    self.observer.emit(Observation::EventListenerFailed {
                        event: envelope.clone(),
                        error: BridgeError::HandlerFailed {
                            message_type: envelope.message_type().to_string(),
                            reason: failure.reason,
                        },
                    });
                }
                None
            }
            MessageKind::Command | MessageKind::Query => {
                self.stats.requests_dispatched.fetch_add(1, Ordering::Relaxed);
                let registry = self.registry_for(envelope.kind);
                let outcome = self
                    .dispatch_and_observe(registry, &envelope, envelope.kind)
                    .await;
                Some(envelope.reply_with(outcome))
            }
        }
    }

    /// Attach the forwarder's event tap, replacing any predecessor.
    /// Returns the receiving end the forwarder consumes.
    pub fn attach_event_tap(&self, capacity: usize) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(capacity);
        *self.event_tap.lock() = Some(tx);
        rx
    }

    /// Attach the forwarder's command tap, replacing any predecessor.
    pub fn attach_command_tap(&self, capacity: usize) -> mpsc::Receiver<ForwardRequest> {
        let (tx, rx) = mpsc::channel(capacity);
        *self.command_tap.lock() = Some(tx);
        rx
    }

    /// Attach the forwarder's query tap, replacing any predecessor.
    pub fn attach_query_tap(&self, capacity: usize) -> mpsc::Receiver<ForwardRequest> {
        let (tx, rx) = mpsc::channel(capacity);
        *self.query_tap.lock() = Some(tx);
        rx
    }

    fn registry_for(&self, kind: MessageKind) -> &DispatchRegistry {
        match kind {
            MessageKind::Query => &self.queries,
            _ => &self.commands,
        }
    }

    fn request_tap_for(&self, kind: MessageKind) -> &Mutex<Option<mpsc::Sender<ForwardRequest>>> {
        match kind {
            MessageKind::Query => &self.query_tap,
            _ => &self.command_tap,
        }
    }

    async fn dispatch_and_observe(
        &self,
        registry: &DispatchRegistry,
        request: &Envelope,
        kind: MessageKind,
    ) -> Outcome {
        match registry.dispatch(request).await {
            Ok(value) => Outcome::success(value),
            Err(error) => {
                self.observer.emit(match (kind, &error) {
                    (MessageKind::Command, BridgeError::HandlerNotFound { .. }) => {
                        Observation::CommandHandlerNotFound {
                            error: error.clone(),
                        }
                    }
                    (MessageKind::Command, _) => Observation::CommandHandlerFailed {
                        command: request.clone(),
                        error: error.clone(),
                    },
                    (_, BridgeError::HandlerNotFound { .. }) => {
                        Observation::QueryHandlerNotFound {
                            error: error.clone(),
                        }
                    }
                    (_, _) => Observation::QueryHandlerFailed {
                        query: request.clone(),
                        error: error.clone(),
                    },
                });
                Outcome::failure(error.to_string())
            }
        }
    }
}
