//! # Gateway Facade
//!
//! Composes the three per-kind forwarders, the correlation table, and the
//! observer behind one object with a single disposal operation.

use crate::channel::Channel;
use crate::config::GatewayConfig;
use crate::forwarder::{self, ForwarderContext};
use crate::pending::{self, PendingStats, PendingStore};
use bridge_bus::{GatewayObserver, LocalBus};
use bridge_types::MessageKind;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One endpoint of the bridge.
///
/// Owns its forwarder tasks, its correlation table, and (via the bus) its
/// observer; the channel is injected and not owned. Create with
/// [`Gateway::spawn`], tear down with [`Gateway::dispose`].
pub struct Gateway {
    bus: Arc<LocalBus>,
    store: Arc<PendingStore>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl Gateway {
    /// Wire a bus to a channel endpoint and start forwarding.
    ///
    /// Attaches the three outgoing taps, then spawns the outbound workers,
    /// the single writer, the inbound router, and the deadline sweeper.
    #[must_use]
    pub fn spawn(bus: Arc<LocalBus>, channel: Arc<dyn Channel>, config: GatewayConfig) -> Self {
        let store = Arc::new(PendingStore::new(config.max_pending));
        let ctx = Arc::new(ForwarderContext {
            bus: Arc::clone(&bus),
            channel,
            store: Arc::clone(&store),
            observer: Arc::clone(bus.observer()),
            endpoint: config.endpoint.clone(),
        });

        let event_tap = bus.attach_event_tap(config.queue_capacity);
        let command_tap = bus.attach_command_tap(config.queue_capacity);
        let query_tap = bus.attach_query_tap(config.queue_capacity);

        let (writer_tx, writer_rx) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(forwarder::run_writer(Arc::clone(&ctx), writer_rx)),
            tokio::spawn(forwarder::run_event_outbound(
                Arc::clone(&ctx),
                event_tap,
                writer_tx.clone(),
            )),
            tokio::spawn(forwarder::run_request_outbound(
                Arc::clone(&ctx),
                MessageKind::Command,
                command_tap,
                writer_tx.clone(),
                config.default_deadline,
            )),
            tokio::spawn(forwarder::run_request_outbound(
                Arc::clone(&ctx),
                MessageKind::Query,
                query_tap,
                writer_tx.clone(),
                config.default_deadline,
            )),
            tokio::spawn(forwarder::run_inbound(
                Arc::clone(&ctx),
                writer_tx,
                shutdown_rx,
            )),
            tokio::spawn(pending::expiry_sweeper(
                Arc::clone(&store),
                config.sweep_interval,
            )),
        ];

        info!(endpoint = %config.endpoint, "gateway started");
        Self {
            bus,
            store,
            shutdown: shutdown_tx,
            tasks: Mutex::new(tasks),
            disposed: AtomicBool::new(false),
        }
    }

    /// Read access to the observer for subscribing.
    #[must_use]
    pub fn observer(&self) -> &Arc<GatewayObserver> {
        self.bus.observer()
    }

    /// The bus this gateway mirrors.
    #[must_use]
    pub fn bus(&self) -> &Arc<LocalBus> {
        &self.bus
    }

    /// Number of requests currently awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.store.pending_count()
    }

    /// Correlation-table counters.
    #[must_use]
    pub fn pending_stats(&self) -> &PendingStats {
        self.store.stats()
    }

    /// Tear the bridge down. Idempotent.
    ///
    /// Ordered so no new pending entry can be created once disposal begins:
    /// the table closes first, then the forwarding tasks stop and the
    /// channel subscription is released, then every still-pending entry is
    /// rejected with a cancellation outcome.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.store.close();
        let _ = self.shutdown.send(true);

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in &tasks {
            task.abort();
        }

        let drained = self.store.drain();
        if drained > 0 {
            debug!(drained, "rejected pending requests at disposal");
        }

        for task in tasks {
            let _ = task.await;
        }
        info!("gateway disposed");
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        // Best effort when dropped without dispose().
        self.store.close();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.store.drain();
    }
}
