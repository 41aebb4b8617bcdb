//! # Request Dispatch
//!
//! Exactly one handler per command/query type. The single-handler invariant
//! is enforced at registration time via a tagged conflict, not at dispatch
//! time; dispatch itself never raises.

use async_trait::async_trait;
use bridge_types::{BridgeError, Envelope, MessageKind};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Handles commands or queries of a single type.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Produce the result for one request. Errors are flattened into a
    /// `Failure` outcome at the dispatch boundary; they never propagate as
    /// raised errors.
    async fn handle(&self, request: &Envelope) -> anyhow::Result<Value>;
}

/// Adapter turning an async closure into a [`RequestHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Envelope) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn handle(&self, request: &Envelope) -> anyhow::Result<Value> {
        (self.0)(request.clone()).await
    }
}

/// Wrap an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Registry holding at most one handler per message type.
pub struct DispatchRegistry {
    kind: MessageKind,
    handlers: DashMap<String, Arc<dyn RequestHandler>>,
}

impl DispatchRegistry {
    /// Create an empty registry for one request kind.
    #[must_use]
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            handlers: DashMap::new(),
        }
    }

    /// Register the single handler for a message type.
    ///
    /// A second registration for the same type is a configuration error and
    /// is rejected here with [`BridgeError::DuplicateHandler`].
    pub fn register(
        &self,
        message_type: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), BridgeError> {
        let message_type = message_type.into();
        if message_type.is_empty() {
            return Err(BridgeError::EmptyMessageType);
        }
        match self.handlers.entry(message_type.clone()) {
            Entry::Occupied(_) => Err(BridgeError::DuplicateHandler { message_type }),
            Entry::Vacant(vacant) => {
                debug!(kind = self.kind.as_str(), message_type, "handler registered");
                vacant.insert(handler);
                Ok(())
            }
        }
    }

    /// Whether a handler is registered for a message type.
    #[must_use]
    pub fn has_handler(&self, message_type: &str) -> bool {
        self.handlers.contains_key(message_type)
    }

    /// Dispatch a request to its handler.
    ///
    /// Zero handlers yields [`BridgeError::HandlerNotFound`]; a failing
    /// handler yields [`BridgeError::HandlerFailed`] with its error text.
    pub async fn dispatch(&self, request: &Envelope) -> Result<Value, BridgeError> {
        let handler = self
            .handlers
            .get(request.message_type())
            .map(|entry| Arc::clone(entry.value()));
        let Some(handler) = handler else {
            return Err(BridgeError::HandlerNotFound {
                message_type: request.message_type().to_string(),
            });
        };
        handler
            .handle(request)
            .await
            .map_err(|e| BridgeError::HandlerFailed {
                message_type: request.message_type().to_string(),
                reason: e.to_string(),
            })
    }
}
