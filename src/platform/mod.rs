pub mod discord;

use anyhow::Result;
use async_trait::async_trait;

/// A message-created event received from the platform
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// The raw message text
    pub content: String,
    /// Guild the message was posted in; `None` for direct messages
    pub guild_id: Option<String>,
    /// Channel the message was posted in
    pub channel_id: String,
    /// The message's own id
    pub message_id: String,
    /// Display name of the author
    pub author_name: String,
    /// Whether the author is an automated account
    pub author_is_bot: bool,
}

/// A channel resolved from a guild's channel cache
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

/// A message fetched from a channel by id
#[derive(Debug, Clone)]
pub struct LinkedMessage {
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub author_icon_url: Option<String>,
    pub author_is_bot: bool,
}

/// The outbound preview embed payload
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// Attribution line: the linked message's author
    pub author_name: String,
    pub author_icon_url: Option<String>,
    /// Accent color, the author's display color in the guild
    pub accent_color: Option<u32>,
    /// Reformatted message body
    pub body: String,
    /// Deep link back to the linked message
    pub jump_url: String,
}

/// Capabilities the preview pipeline needs from a connected platform
/// session. The Discord implementation wraps serenity's cache and HTTP
/// client; tests substitute a mock.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Look up a channel by id in the given guild's channel cache.
    /// Synchronous: this consults local state, never the network.
    fn visible_channel(&self, guild_id: &str, channel_id: &str) -> Option<ChannelInfo>;

    /// Fetch a single message by id from a channel.
    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<LinkedMessage>;

    /// Resolve a member's current display color in a guild.
    async fn member_accent_color(&self, guild_id: &str, user_id: &str) -> Option<u32>;

    /// Send a preview embed into a channel.
    async fn send_preview(&self, channel_id: &str, preview: &Preview) -> Result<()>;
}
