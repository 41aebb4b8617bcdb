//! # Event Listeners
//!
//! Zero or more listeners per event type, best-effort delivery. A failing
//! listener never fails the publisher: each failure is isolated and
//! reported individually.

use async_trait::async_trait;
use bridge_types::Envelope;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

/// Handles events of a single type.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Called once per delivered event. Errors are reported through the
    /// observer; they never reach the publisher.
    async fn on_event(&self, event: &Envelope) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into an [`EventListener`].
pub struct FnListener<F>(pub F);

#[async_trait]
impl<F, Fut> EventListener for FnListener<F>
where
    F: Fn(Envelope) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn on_event(&self, event: &Envelope) -> anyhow::Result<()> {
        (self.0)(event.clone()).await
    }
}

/// Wrap an async closure as a shareable listener.
pub fn listener_fn<F, Fut>(f: F) -> Arc<dyn EventListener>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnListener(f))
}

/// One failed listener delivery.
#[derive(Debug)]
pub struct ListenerFailure {
    /// Position of the listener in registration order.
    pub listener: usize,
    /// The listener's error text.
    pub reason: String,
}

/// Outcome of delivering one event locally.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Listeners that completed without error.
    pub delivered: usize,
    /// Per-listener failures, isolated from each other.
    pub failures: Vec<ListenerFailure>,
}

impl DeliveryReport {
    /// Whether anyone was registered for the event's type at all.
    #[must_use]
    pub fn had_listeners(&self) -> bool {
        self.delivered > 0 || !self.failures.is_empty()
    }
}

/// Registry mapping event type to its listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<String, Vec<Arc<dyn EventListener>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional listener for an event type.
    pub fn add(&self, message_type: impl Into<String>, listener: Arc<dyn EventListener>) {
        self.listeners
            .entry(message_type.into())
            .or_default()
            .push(listener);
    }

    /// Number of listeners registered for an event type.
    #[must_use]
    pub fn listener_count(&self, message_type: &str) -> usize {
        self.listeners
            .get(message_type)
            .map_or(0, |entry| entry.len())
    }

    /// Deliver an event to every listener of its type, in registration
    /// order, isolating each listener's failure.
    pub async fn deliver(&self, event: &Envelope) -> DeliveryReport {
        // Clone the target list out of the map so no guard is held across
        // an await point.
        let targets: Vec<Arc<dyn EventListener>> = self
            .listeners
            .get(event.message_type())
            .map(|entry| entry.clone())
            .unwrap_or_default();

        let mut report = DeliveryReport::default();
        for (index, listener) in targets.iter().enumerate() {
            match listener.on_event(event).await {
                Ok(()) => report.delivered += 1,
                Err(e) => report.failures.push(ListenerFailure {
                    listener: index,
                    reason: e.to_string(),
                }),
            }
        }
        report
    }
}
