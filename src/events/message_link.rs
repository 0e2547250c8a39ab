use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::detector;
use crate::events::{EventKind, EventListener};
use crate::platform::{ChatSession, InboundMessage};
use crate::preview::PreviewService;

/// Watches every created message for a Discord message link and posts a
/// preview of the linked message.
pub struct MessageLinkHandler {
    previews: Arc<PreviewService>,
}

impl MessageLinkHandler {
    pub fn new(previews: Arc<PreviewService>) -> Self {
        Self { previews }
    }
}

#[async_trait]
impl EventListener for MessageLinkHandler {
    fn event(&self) -> EventKind {
        EventKind::MessageCreate
    }

    fn name(&self) -> &'static str {
        "message_link"
    }

    async fn handle(&self, session: &dyn ChatSession, message: &InboundMessage) -> Result<()> {
        // Other bots posting links would make previews feed each other.
        if message.author_is_bot {
            return Ok(());
        }

        let Some(link) = detector::find_message_link(&message.content) else {
            return Ok(());
        };

        debug!(
            "Message {} from {} links to {}",
            message.message_id, message.author_name, link
        );

        self.previews.generate_preview(session, &link, message).await
    }
}
