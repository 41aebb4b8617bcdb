//! # End-to-End Bridge Tests
//!
//! Two complete endpoints — each a `LocalBus` plus a `Gateway` — wired
//! together over an in-memory channel pair:
//!
//! ```text
//! [Bus A] ──tap──→ [Gateway A] ══ channel pair ══ [Gateway B] ──dispatch──→ [Bus B]
//!    ↑                  │                              │                       │
//!    └── settle ←── [Pending A] ←──── reply ───────────┴──── handler ←─────────┘
//! ```
//!
//! ## Scenario Categories
//!
//! 1. **Happy path**: command/query round trips with correlated results
//! 2. **Failure surfacing**: missing handlers, failing handlers, stale replies
//! 3. **Loop prevention**: mirrored traffic is never mirrored back
//! 4. **Lifecycle**: timeouts and disposal drain the correlation table

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    use bridge_bus::{handler_fn, listener_fn, GatewayObserver, LocalBus};
    use bridge_gateway::{Channel, Gateway, GatewayConfig, InMemoryChannel};
    use bridge_types::{wire, Envelope, Outcome, Reply};
    use serde_json::json;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    /// Route test logs through `RUST_LOG`; repeated calls are no-ops.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    struct Endpoint {
        bus: Arc<LocalBus>,
        gateway: Gateway,
    }

    fn endpoint(channel: InMemoryChannel, name: &str) -> Endpoint {
        let bus = Arc::new(LocalBus::new(Arc::new(GatewayObserver::new())));
        let gateway = Gateway::spawn(
            Arc::clone(&bus),
            Arc::new(channel),
            GatewayConfig::for_endpoint(name),
        );
        Endpoint { bus, gateway }
    }

    /// Two endpoints bridged over an in-memory pair: "main" and "renderer".
    fn bridged_pair() -> (Endpoint, Endpoint) {
        init_tracing();
        let (left, right) = InMemoryChannel::pair(64);
        (endpoint(left, "main"), endpoint(right, "renderer"))
    }

    /// Count emissions of one observation name.
    fn count(observer: &GatewayObserver, name: &str) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&counter);
        observer.on(name, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        counter
    }

    async fn settle<F: std::future::Future<Output = Outcome>>(future: F) -> Outcome {
        timeout(Duration::from_secs(2), future)
            .await
            .expect("request never settled")
    }

    // =========================================================================
    // HAPPY PATH
    // =========================================================================

    /// Process A sends a command; process B's handler returns a value; A's
    /// awaiting call resolves to that value and no failure observation fires
    /// on either side.
    #[tokio::test]
    async fn test_command_round_trip() {
        let (a, b) = bridged_pair();

        let a_failed = count(a.bus.observer(), "command_handler_failed");
        let a_missing = count(a.bus.observer(), "command_handler_not_found");
        let b_failed = count(b.bus.observer(), "command_handler_failed");
        let b_missing = count(b.bus.observer(), "command_handler_not_found");

        b.bus
            .register_command_handler(
                "CreateOrder",
                handler_fn(|_| async { Ok(json!({"orderId": "o1"})) }),
            )
            .unwrap();

        let command = Envelope::command("CreateOrder", json!({"qty": 2})).unwrap();
        let outcome = settle(a.bus.send_command(command)).await;

        match outcome {
            Outcome::Success { value } => assert_eq!(value["orderId"], "o1"),
            Outcome::Failure { error } => panic!("unexpected failure: {error}"),
        }
        assert_eq!(a.gateway.pending_count(), 0);
        for counter in [a_failed, a_missing, b_failed, b_missing] {
            assert_eq!(counter.load(Ordering::SeqCst), 0);
        }

        a.gateway.dispose().await;
        b.gateway.dispose().await;
    }

    /// The reply settling a query carries the query's own result, even with
    /// many requests in flight and replies arriving out of order.
    #[tokio::test]
    async fn test_interleaved_queries_correlate() {
        let (a, b) = bridged_pair();

        b.bus
            .register_query_handler(
                "Echo",
                handler_fn(|query: Envelope| async move {
                    // Later requests answer first.
                    let n = query.payload["n"].as_u64().unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(50u64.saturating_sub(n * 5))).await;
                    Ok(query.payload)
                }),
            )
            .unwrap();

        let mut calls = Vec::new();
        for n in 0..10u64 {
            let bus = Arc::clone(&a.bus);
            calls.push(tokio::spawn(async move {
                let query = Envelope::query("Echo", json!({ "n": n })).unwrap();
                (n, bus.send_query(query).await)
            }));
        }

        for call in calls {
            let (n, outcome) = timeout(Duration::from_secs(2), call)
                .await
                .expect("query never settled")
                .unwrap();
            match outcome {
                Outcome::Success { value } => assert_eq!(value["n"], n),
                Outcome::Failure { error } => panic!("query {n} failed: {error}"),
            }
        }
        assert_eq!(a.gateway.pending_count(), 0);

        a.gateway.dispose().await;
        b.gateway.dispose().await;
    }

    // =========================================================================
    // FAILURE SURFACING
    // =========================================================================

    /// A query to a process with no matching handler resolves to a failure
    /// mentioning the lookup, and the remote side emits
    /// `query_handler_not_found` exactly once.
    #[tokio::test]
    async fn test_query_without_remote_handler() {
        let (a, b) = bridged_pair();
        let b_missing = count(b.bus.observer(), "query_handler_not_found");

        let query = Envelope::query("GetOrder", json!({"id": "o1"})).unwrap();
        let outcome = settle(a.bus.send_query(query)).await;

        assert!(outcome.error().unwrap().contains("handler not found"));
        assert_eq!(b_missing.load(Ordering::SeqCst), 1);
        assert_eq!(a.gateway.pending_count(), 0);

        a.gateway.dispose().await;
        b.gateway.dispose().await;
    }

    /// A remote handler error comes back as a failure outcome shaped exactly
    /// like a local one, and the remote side emits `command_handler_failed`.
    #[tokio::test]
    async fn test_remote_handler_failure_is_replied() {
        let (a, b) = bridged_pair();
        let b_failed = count(b.bus.observer(), "command_handler_failed");

        b.bus
            .register_command_handler(
                "CreateOrder",
                handler_fn(|_| async { anyhow::bail!("out of stock") }),
            )
            .unwrap();

        let command = Envelope::command("CreateOrder", json!({})).unwrap();
        let outcome = settle(a.bus.send_command(command)).await;

        assert!(outcome.error().unwrap().contains("out of stock"));
        assert_eq!(b_failed.load(Ordering::SeqCst), 1);

        a.gateway.dispose().await;
        b.gateway.dispose().await;
    }

    /// An event published with no remote listener surfaces nothing to the
    /// publisher; the remote side emits `event_listener_failed` with a
    /// not-found indication.
    #[tokio::test]
    async fn test_event_without_remote_listener() {
        let (a, b) = bridged_pair();
        let b_listener_failed = Arc::new(AtomicUsize::new(0));
        {
            let hits = Arc::clone(&b_listener_failed);
            b.bus.observer().on("event_listener_failed", move |observation| {
                assert!(observation.error().to_string().contains("handler not found"));
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        a.bus
            .publish(Envelope::event("OrderCreated", json!({"orderId": "o1"})).unwrap())
            .await;

        timeout(Duration::from_secs(1), async {
            while b_listener_failed.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("remote side never observed the unhandled event");

        a.gateway.dispose().await;
        b.gateway.dispose().await;
    }

    /// Two replies with the same `inReplyTo`: exactly one settlement and one
    /// stale-reply count.
    #[tokio::test]
    async fn test_duplicate_reply_is_stale() {
        let (left, right) = InMemoryChannel::pair(64);
        let a = endpoint(left, "main");
        // Play the peer by hand on the raw channel end.
        let peer = Arc::new(right);

        let query = Envelope::query("GetOrder", json!({"id": "o1"})).unwrap();
        let caller = {
            let bus = Arc::clone(&a.bus);
            tokio::spawn(async move { bus.send_query(query).await })
        };

        // Receive the forwarded query.
        let (topic, payload) = timeout(Duration::from_secs(1), peer.recv())
            .await
            .expect("no frame arrived")
            .expect("channel closed");
        assert_eq!(topic, wire::topics::QUERIES);
        let received = wire::decode_envelope(&payload).unwrap();

        // Reply twice with the same id.
        let reply = Reply::success(received.id(), json!({"orderId": "o1"}));
        let bytes = wire::encode_reply(&reply).unwrap();
        peer.send(wire::topics::QUERY_REPLIES, bytes.clone())
            .await
            .unwrap();
        peer.send(wire::topics::QUERY_REPLIES, bytes).await.unwrap();

        let outcome = timeout(Duration::from_secs(1), caller)
            .await
            .expect("query never settled")
            .unwrap();
        assert!(outcome.is_success());

        // The second reply is discarded and counted, never fatal.
        timeout(Duration::from_secs(1), async {
            while a.gateway.pending_stats().stale_replies.load(Ordering::Relaxed) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("stale reply was never counted");
        assert_eq!(
            a.gateway.pending_stats().settled_by_reply.load(Ordering::Relaxed),
            1
        );

        a.gateway.dispose().await;
    }

    // =========================================================================
    // LOOP PREVENTION
    // =========================================================================

    /// With symmetric bridges on both ends, a published event is delivered
    /// exactly once per side — an envelope received from the channel never
    /// triggers a second outbound forward of itself.
    #[tokio::test]
    async fn test_no_event_reforward_loop() {
        let (a, b) = bridged_pair();

        let a_seen = Arc::new(AtomicUsize::new(0));
        let b_seen = Arc::new(AtomicUsize::new(0));
        for (bus, seen) in [(&a.bus, &a_seen), (&b.bus, &b_seen)] {
            let seen = Arc::clone(seen);
            bus.add_listener(
                "OrderCreated",
                listener_fn(move |_| {
                    let seen = Arc::clone(&seen);
                    async move {
                        seen.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            );
        }

        a.bus
            .publish(Envelope::event("OrderCreated", json!({})).unwrap())
            .await;

        timeout(Duration::from_secs(1), async {
            while b_seen.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("event never crossed the bridge");

        // Let any bounce, if one existed, come back around.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(a_seen.load(Ordering::SeqCst), 1);
        assert_eq!(b_seen.load(Ordering::SeqCst), 1);

        a.gateway.dispose().await;
        b.gateway.dispose().await;
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// A command with a 50ms deadline and an unresponsive peer settles as a
    /// timeout failure and leaves no table entry behind.
    #[tokio::test]
    async fn test_timeout_with_unresponsive_peer() {
        let (left, right) = InMemoryChannel::pair(64);
        let config = GatewayConfig::for_endpoint("main")
            .with_deadline(Duration::from_millis(50))
            .with_sweep_interval(Duration::from_millis(10));
        let bus = Arc::new(LocalBus::new(Arc::new(GatewayObserver::new())));
        let gateway = Gateway::spawn(Arc::clone(&bus), Arc::new(left), config);
        let _peer = right; // alive but silent

        let command = Envelope::command("CreateOrder", json!({})).unwrap();
        let outcome = settle(bus.send_command(command)).await;

        assert!(outcome.error().unwrap().contains("timed out"));
        assert_eq!(gateway.pending_count(), 0);
        assert_eq!(gateway.pending_stats().timeouts.load(Ordering::Relaxed), 1);

        gateway.dispose().await;
    }

    /// Disposal while a remote handler is still working: the caller settles
    /// with a cancellation failure and the table is empty afterwards.
    #[tokio::test]
    async fn test_dispose_cancels_in_flight_request() {
        let (a, b) = bridged_pair();

        b.bus
            .register_query_handler(
                "SlowQuery",
                handler_fn(|_| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(json!(null))
                }),
            )
            .unwrap();

        let caller = {
            let bus = Arc::clone(&a.bus);
            tokio::spawn(async move {
                bus.send_query(Envelope::query("SlowQuery", json!({})).unwrap())
                    .await
            })
        };

        timeout(Duration::from_secs(1), async {
            while a.gateway.pending_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("request never became pending");

        a.gateway.dispose().await;

        let outcome = timeout(Duration::from_secs(1), caller)
            .await
            .expect("caller never settled")
            .unwrap();
        assert!(outcome.error().unwrap().contains("disposed"));
        assert_eq!(a.gateway.pending_count(), 0);

        b.gateway.dispose().await;
    }

    /// After disposal, new requests fail locally instead of being forwarded.
    #[tokio::test]
    async fn test_no_forwarding_after_dispose() {
        let (a, b) = bridged_pair();
        b.bus
            .register_query_handler("GetOrder", handler_fn(|_| async { Ok(json!({})) }))
            .unwrap();

        a.gateway.dispose().await;

        let outcome = settle(a.bus.send_query(Envelope::query("GetOrder", json!({})).unwrap())).await;
        assert!(!outcome.is_success());
        assert_eq!(a.gateway.pending_count(), 0);

        b.gateway.dispose().await;
    }
}
