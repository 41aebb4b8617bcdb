//! # Forwarder
//!
//! Mirrors locally originated traffic across the channel and routes inbound
//! frames to local dispatch or correlation settlement.
//!
//! Loop prevention: envelopes received from the channel are dispatched
//! through the bus's tap-bypassing inbound path, and replies are written
//! straight back to the channel — a reply is never itself a candidate for
//! forwarding. Only original event/command/query envelopes ever leave
//! through the outbound workers.

use crate::channel::Channel;
use crate::pending::{PendingStore, SettleReason};
use bridge_bus::{ForwardRequest, GatewayObserver, LocalBus, Observation};
use bridge_types::{wire, BridgeError, Envelope, MessageKind, Outcome, Reply};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Shared context for the forwarding tasks.
pub(crate) struct ForwarderContext {
    pub bus: Arc<LocalBus>,
    pub channel: Arc<dyn Channel>,
    pub store: Arc<PendingStore>,
    pub observer: Arc<GatewayObserver>,
    pub endpoint: String,
}

/// One frame queued for the single writer.
///
/// `origin` is the envelope to settle/observe if the write fails; reply
/// frames carry `None` (an undeliverable reply times out on the remote
/// side instead).
pub(crate) struct OutboundFrame {
    pub topic: &'static str,
    pub payload: Vec<u8>,
    pub origin: Option<Envelope>,
}

/// Single writer: every outbound write goes through here, so a transport
/// that requires ordered writes gets them without limiting concurrent
/// inbound dispatch.
pub(crate) async fn run_writer(ctx: Arc<ForwarderContext>, mut queue: mpsc::Receiver<OutboundFrame>) {
    while let Some(frame) = queue.recv().await {
        if let Err(error) = ctx.channel.send(frame.topic, frame.payload).await {
            handle_write_failure(&ctx, frame.origin, &error);
        }
    }
    debug!(endpoint = %ctx.endpoint, "writer queue closed");
}

/// Outbound events: fire-and-forget, no state.
pub(crate) async fn run_event_outbound(
    ctx: Arc<ForwarderContext>,
    mut tap: mpsc::Receiver<Envelope>,
    writer: mpsc::Sender<OutboundFrame>,
) {
    while let Some(event) = tap.recv().await {
        match wire::encode_envelope(&event) {
            Ok(payload) => {
                let frame = OutboundFrame {
                    topic: wire::topic_for(MessageKind::Event),
                    payload,
                    origin: Some(event),
                };
                if writer.send(frame).await.is_err() {
                    break;
                }
            }
            Err(error) => {
                ctx.observer
                    .emit(Observation::EventForwardFailed { event, error });
            }
        }
    }
    debug!(endpoint = %ctx.endpoint, "event tap closed");
}

/// Outbound commands or queries: register in the correlation table, then
/// write. A request whose write fails settles immediately — `Created`
/// straight to `Settled(Failure)`, never `AwaitingReply`.
pub(crate) async fn run_request_outbound(
    ctx: Arc<ForwarderContext>,
    kind: MessageKind,
    mut tap: mpsc::Receiver<ForwardRequest>,
    writer: mpsc::Sender<OutboundFrame>,
    deadline: Duration,
) {
    while let Some(ForwardRequest {
        envelope,
        completion,
    }) = tap.recv().await
    {
        // Register before writing so a fast peer cannot reply into a void.
        // On refusal the completion is already settled by the store.
        if let Err(error) = ctx.store.register(&envelope, deadline, completion) {
            emit_forward_failure(&ctx.observer, kind, envelope, &error);
            continue;
        }

        match wire::encode_envelope(&envelope) {
            Ok(payload) => {
                let frame = OutboundFrame {
                    topic: wire::topic_for(kind),
                    payload,
                    origin: Some(envelope),
                };
                if writer.send(frame).await.is_err() {
                    // Writer gone; disposal drains the entry.
                    break;
                }
            }
            Err(error) => {
                ctx.store.settle(
                    envelope.id(),
                    Outcome::failure(error.to_string()),
                    SettleReason::WriteFailure,
                );
                emit_forward_failure(&ctx.observer, kind, envelope, &error);
            }
        }
    }
    debug!(endpoint = %ctx.endpoint, kind = kind.as_str(), "request tap closed");
}

/// Inbound router: reads frames until the channel closes or shutdown fires.
pub(crate) async fn run_inbound(
    ctx: Arc<ForwarderContext>,
    writer: mpsc::Sender<OutboundFrame>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = ctx.channel.recv() => frame,
        };
        let Some((topic, payload)) = frame else {
            debug!(endpoint = %ctx.endpoint, "channel closed by peer");
            break;
        };
        route_frame(&ctx, &writer, &topic, &payload);
    }
}

/// Route one inbound frame by its channel name.
fn route_frame(
    ctx: &Arc<ForwarderContext>,
    writer: &mpsc::Sender<OutboundFrame>,
    topic: &str,
    payload: &[u8],
) {
    if wire::reply_kind_for_topic(topic).is_some() {
        match wire::decode_reply(payload) {
            Ok(reply) => settle_reply(ctx, reply),
            Err(error) => warn!(topic, %error, "dropping undecodable reply"),
        }
        return;
    }

    match wire::kind_for_topic(topic) {
        Some(expected) => match wire::decode_envelope(payload) {
            Ok(envelope) if envelope.kind == expected => dispatch_frame(ctx, writer, envelope),
            Ok(envelope) => {
                warn!(topic, kind = envelope.kind.as_str(), "kind/topic mismatch; dropping");
            }
            Err(error) => warn!(topic, %error, "dropping undecodable envelope"),
        },
        None => warn!(topic, "frame on unknown channel; dropping"),
    }
}

/// Resolve a reply against the correlation table. A reply that matches
/// nothing is stale: counted and ignored, never fatal, never re-forwarded.
fn settle_reply(ctx: &ForwarderContext, reply: Reply) {
    ctx.store
        .settle(reply.in_reply_to, reply.outcome, SettleReason::Reply);
}

/// Dispatch an inbound envelope locally on its own task, so replies for
/// different in-flight requests interleave freely.
fn dispatch_frame(
    ctx: &Arc<ForwarderContext>,
    writer: &mpsc::Sender<OutboundFrame>,
    envelope: Envelope,
) {
    let ctx = Arc::clone(ctx);
    let writer = writer.clone();
    tokio::spawn(async move {
        let kind = envelope.kind;
        let Some(reply) = ctx.bus.dispatch_inbound(envelope).await else {
            return; // events produce no reply
        };

        let Some(topic) = wire::reply_topic_for(kind) else {
            return;
        };
        match wire::encode_reply(&reply) {
            Ok(payload) => {
                let frame = OutboundFrame {
                    topic,
                    payload,
                    origin: None,
                };
                if writer.send(frame).await.is_err() {
                    warn!(message_id = %reply.in_reply_to, "writer closed before reply was sent");
                }
            }
            Err(error) => warn!(message_id = %reply.in_reply_to, %error, "failed to encode reply"),
        }
    });
}

/// A channel write failed: settle the pending entry (requests) and emit the
/// forward-failure observation.
fn handle_write_failure(ctx: &ForwarderContext, origin: Option<Envelope>, error: &BridgeError) {
    let Some(envelope) = origin else {
        warn!(endpoint = %ctx.endpoint, %error, "failed to write reply; remote entry will time out");
        return;
    };
    let error = BridgeError::ForwardFailed(error.to_string());
    if envelope.kind.expects_reply() {
        ctx.store.settle(
            envelope.id(),
            Outcome::failure(error.to_string()),
            SettleReason::WriteFailure,
        );
    }
    emit_forward_failure(&ctx.observer, envelope.kind, envelope, &error);
}

fn emit_forward_failure(
    observer: &GatewayObserver,
    kind: MessageKind,
    envelope: Envelope,
    error: &BridgeError,
) {
    let error = error.clone();
    observer.emit(match kind {
        MessageKind::Event => Observation::EventForwardFailed {
            event: envelope,
            error,
        },
        MessageKind::Command => Observation::CommandForwardFailed {
            command: envelope,
            error,
        },
        MessageKind::Query => Observation::QueryForwardFailed {
            query: envelope,
            error,
        },
    });
}
