pub mod message_link;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};

use crate::platform::{ChatSession, InboundMessage};
use crate::preview::PreviewService;

/// Gateway events the dispatcher routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageCreate,
}

/// A handler for one event kind. Each listener declares the event it
/// serves and provides a single handling function.
#[async_trait]
pub trait EventListener: Send + Sync {
    fn event(&self) -> EventKind;

    fn name(&self) -> &'static str;

    async fn handle(&self, session: &dyn ChatSession, message: &InboundMessage) -> Result<()>;
}

/// Maps each event kind to its listeners, in registration order.
pub struct HandlerRegistry {
    listeners: HashMap<EventKind, Vec<Arc<dyn EventListener>>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }

    pub fn register(&mut self, listener: Arc<dyn EventListener>) {
        info!("Registered handler: {} ({:?})", listener.name(), listener.event());
        self.listeners
            .entry(listener.event())
            .or_default()
            .push(listener);
    }

    /// Invoke every listener registered for `kind`. Listener errors are
    /// logged and swallowed so the event loop keeps running.
    pub async fn dispatch(
        &self,
        kind: EventKind,
        session: &dyn ChatSession,
        message: &InboundMessage,
    ) {
        let Some(listeners) = self.listeners.get(&kind) else {
            return;
        };

        for listener in listeners {
            if let Err(e) = listener.handle(session, message).await {
                error!("Handler {} failed: {:#}", listener.name(), e);
            }
        }
    }
}

/// The static registration list. New handlers are added here, not
/// discovered at runtime.
pub fn default_listeners(previews: Arc<PreviewService>) -> Vec<Arc<dyn EventListener>> {
    vec![Arc::new(message_link::MessageLinkHandler::new(previews))]
}
