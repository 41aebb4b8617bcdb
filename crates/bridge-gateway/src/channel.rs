//! # Channel
//!
//! The injected duplex transport between the two endpoints. Delivery is
//! asynchronous, at-most-once, and unordered across channels; the bridge
//! inherits those semantics rather than strengthening them. The channel's
//! lifecycle belongs to the host process, not the gateway.

use async_trait::async_trait;
use bridge_types::BridgeError;
use tokio::sync::{mpsc, Mutex};

/// One inbound frame: the well-known channel name and the raw bytes.
pub type InboundFrame = (String, Vec<u8>);

/// Duplex byte transport between two cooperating endpoints.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Write one frame to the peer.
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), BridgeError>;

    /// Receive the next frame from the peer; `None` once the peer is gone.
    async fn recv(&self) -> Option<InboundFrame>;
}

/// In-memory channel endpoint, created in connected pairs.
///
/// Frames travel over a bounded queue, so writes are ordered per direction.
/// Dropping one endpoint makes the peer's `recv` return `None`.
pub struct InMemoryChannel {
    tx: mpsc::Sender<InboundFrame>,
    rx: Mutex<mpsc::Receiver<InboundFrame>>,
}

impl InMemoryChannel {
    /// Create two connected endpoints with the given per-direction capacity.
    #[must_use]
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::channel(capacity);
        let (right_tx, left_rx) = mpsc::channel(capacity);
        (
            Self {
                tx: left_tx,
                rx: Mutex::new(left_rx),
            },
            Self {
                tx: right_tx,
                rx: Mutex::new(right_rx),
            },
        )
    }
}

#[async_trait]
impl Channel for InMemoryChannel {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), BridgeError> {
        self.tx
            .send((topic.to_string(), payload))
            .await
            .map_err(|_| BridgeError::ChannelClosed)
    }

    async fn recv(&self) -> Option<InboundFrame> {
        self.rx.lock().await.recv().await
    }
}
