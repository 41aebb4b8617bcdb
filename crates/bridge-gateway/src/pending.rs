//! # Correlation Table
//!
//! Tracks cross-process commands and queries awaiting a reply, keyed by
//! message id. Every registered entry settles exactly once — by a genuine
//! reply, by its deadline, or by gateway disposal — with the table's
//! `remove` as the single arbiter between racing settlers.

use bridge_types::{BridgeError, Envelope, MessageId, MessageKind, Outcome};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Why an entry settled, for accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleReason {
    /// A correlated reply arrived from the peer.
    Reply,
    /// The channel write failed before a reply could exist.
    WriteFailure,
    /// The deadline elapsed.
    Timeout,
    /// The gateway was disposed.
    Disposal,
}

struct PendingEntry {
    kind: MessageKind,
    message_type: String,
    created_at: Instant,
    deadline: Duration,
    completion: oneshot::Sender<Outcome>,
}

/// Counters over the table's lifetime.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Entries created.
    pub registered: AtomicU64,
    /// Entries settled by a genuine reply.
    pub settled_by_reply: AtomicU64,
    /// Entries settled by a failed channel write.
    pub write_failures: AtomicU64,
    /// Entries settled by deadline expiry.
    pub timeouts: AtomicU64,
    /// Entries settled by disposal.
    pub cancelled: AtomicU64,
    /// Replies that arrived for ids not pending.
    pub stale_replies: AtomicU64,
}

/// The correlation table.
pub struct PendingStore {
    entries: DashMap<MessageId, PendingEntry>,
    max_pending: usize,
    closed: AtomicBool,
    stats: PendingStats,
}

impl PendingStore {
    /// Create a table bounded at `max_pending` concurrent entries.
    #[must_use]
    pub fn new(max_pending: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_pending,
            closed: AtomicBool::new(false),
            stats: PendingStats::default(),
        }
    }

    /// Create a pending entry for an outbound request.
    ///
    /// The caller's `completion` is consumed either way: on refusal (table
    /// closed or full) it is settled immediately with the failure, so no
    /// awaiting caller is ever left dangling. Registration after disposal
    /// has begun is impossible: a racing insert is taken back out and
    /// cancelled.
    pub fn register(
        &self,
        envelope: &Envelope,
        deadline: Duration,
        completion: oneshot::Sender<Outcome>,
    ) -> Result<(), BridgeError> {
        let refusal = if self.closed.load(Ordering::SeqCst) {
            Some(BridgeError::Disposed)
        } else if self.entries.len() >= self.max_pending {
            Some(BridgeError::PendingLimitReached {
                limit: self.max_pending,
            })
        } else {
            None
        };
        if let Some(error) = refusal {
            let _ = completion.send(Outcome::failure(error.to_string()));
            return Err(error);
        }

        let id = envelope.id();
        self.entries.insert(
            id,
            PendingEntry {
                kind: envelope.kind,
                message_type: envelope.message_type().to_string(),
                created_at: Instant::now(),
                deadline,
                completion,
            },
        );
        self.stats.registered.fetch_add(1, Ordering::Relaxed);

        if self.closed.load(Ordering::SeqCst) {
            // Disposal raced the insert; take the entry back out.
            self.settle(
                id,
                Outcome::failure(BridgeError::Disposed.to_string()),
                SettleReason::Disposal,
            );
            return Err(BridgeError::Disposed);
        }

        debug!(
            message_id = %id,
            kind = envelope.kind.as_str(),
            deadline_ms = deadline.as_millis() as u64,
            "registered pending request"
        );
        Ok(())
    }

    /// Settle the entry for `id` exactly once.
    ///
    /// Returns `false` when no entry is pending for the id — never
    /// registered, already settled, or expired. For genuine replies that is
    /// the stale-reply condition: counted, never fatal.
    pub fn settle(&self, id: MessageId, outcome: Outcome, reason: SettleReason) -> bool {
        let Some((_, entry)) = self.entries.remove(&id) else {
            if reason == SettleReason::Reply {
                self.stats.stale_replies.fetch_add(1, Ordering::Relaxed);
                warn!(message_id = %id, "stale or unknown reply");
            }
            return false;
        };

        let counter = match reason {
            SettleReason::Reply => &self.stats.settled_by_reply,
            SettleReason::WriteFailure => &self.stats.write_failures,
            SettleReason::Timeout => &self.stats.timeouts,
            SettleReason::Disposal => &self.stats.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        debug!(
            message_id = %id,
            kind = entry.kind.as_str(),
            message_type = entry.message_type,
            reason = ?reason,
            waited_ms = entry.created_at.elapsed().as_millis() as u64,
            "settled pending request"
        );
        if entry.completion.send(outcome).is_err() {
            // The caller stopped awaiting; the entry is settled regardless.
            debug!(message_id = %id, "completion receiver dropped");
        }
        true
    }

    /// Settle every entry past its deadline with a timeout failure.
    ///
    /// Returns the number of entries expired.
    pub fn expire_overdue(&self) -> usize {
        let now = Instant::now();
        let overdue: Vec<(MessageId, u64)> = self
            .entries
            .iter()
            .filter(|entry| now.duration_since(entry.created_at) > entry.deadline)
            .map(|entry| {
                let waited = now.duration_since(entry.created_at).as_millis() as u64;
                (*entry.key(), waited)
            })
            .collect();

        let mut expired = 0;
        for (id, waited_ms) in overdue {
            let error = BridgeError::Timeout { waited_ms };
            if self.settle(id, Outcome::failure(error.to_string()), SettleReason::Timeout) {
                warn!(message_id = %id, waited_ms, "pending request timed out");
                expired += 1;
            }
        }
        expired
    }

    /// Stop accepting new entries. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether disposal has begun.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Settle everything still pending with a cancellation failure.
    ///
    /// Returns the number of entries drained.
    pub fn drain(&self) -> usize {
        let ids: Vec<MessageId> = self.entries.iter().map(|entry| *entry.key()).collect();
        let mut drained = 0;
        for id in ids {
            if self.settle(
                id,
                Outcome::failure(BridgeError::Disposed.to_string()),
                SettleReason::Disposal,
            ) {
                drained += 1;
            }
        }
        drained
    }

    /// Number of entries currently pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether an id is currently pending.
    #[must_use]
    pub fn is_pending(&self, id: &MessageId) -> bool {
        self.entries.contains_key(id)
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

/// Periodically expire overdue entries until the store closes.
pub async fn expiry_sweeper(store: Arc<PendingStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if store.is_closed() {
            break;
        }
        store.expire_overdue();
    }
}
