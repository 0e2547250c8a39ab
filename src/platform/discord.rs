use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::all::{
    Cache, ChannelId, Client, Context, CreateEmbed, CreateEmbedAuthor, CreateMessage,
    EventHandler, GatewayIntents, GuildId, Http, Message, MessageId, Ready, UserId,
};
use tracing::{debug, info};

use crate::config::Config;
use crate::events::{EventKind, HandlerRegistry};
use crate::platform::{ChannelInfo, ChatSession, InboundMessage, LinkedMessage, Preview};

/// Gateway intents the bot needs: guild metadata for the channel cache,
/// message events, and message text.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

// Discord ids are non-zero snowflakes; serenity's id constructors reject 0.
fn parse_id(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|id| *id != 0)
}

/// [`ChatSession`] backed by serenity's cache and HTTP client.
pub struct DiscordSession {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordSession {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }
}

#[async_trait]
impl ChatSession for DiscordSession {
    fn visible_channel(&self, guild_id: &str, channel_id: &str) -> Option<ChannelInfo> {
        let guild = self.cache.guild(GuildId::new(parse_id(guild_id)?))?;
        let channel = guild.channels.get(&ChannelId::new(parse_id(channel_id)?))?;

        Some(ChannelInfo {
            id: channel.id.to_string(),
            name: channel.name.clone(),
        })
    }

    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<LinkedMessage> {
        let channel = parse_id(channel_id).context("Invalid channel id")?;
        let message = parse_id(message_id).context("Invalid message id")?;

        let fetched = self
            .http
            .get_message(ChannelId::new(channel), MessageId::new(message))
            .await?;

        Ok(LinkedMessage {
            content: fetched.content.clone(),
            author_id: fetched.author.id.to_string(),
            author_name: fetched
                .author
                .global_name
                .clone()
                .unwrap_or_else(|| fetched.author.name.clone()),
            author_icon_url: Some(fetched.author.face()),
            author_is_bot: fetched.author.bot,
        })
    }

    async fn member_accent_color(&self, guild_id: &str, user_id: &str) -> Option<u32> {
        let guild = GuildId::new(parse_id(guild_id)?);
        let user = UserId::new(parse_id(user_id)?);

        // Fetched fresh so role/color changes show up in the next preview.
        let member = guild.member(&self.http, user).await.ok()?;
        member.colour(&self.cache).map(|colour| colour.0)
    }

    async fn send_preview(&self, channel_id: &str, preview: &Preview) -> Result<()> {
        let channel = ChannelId::new(parse_id(channel_id).context("Invalid channel id")?);

        let mut author = CreateEmbedAuthor::new(&preview.author_name);
        if let Some(icon) = &preview.author_icon_url {
            author = author.icon_url(icon);
        }

        let mut embed = CreateEmbed::new()
            .author(author)
            .description(&preview.body)
            .field(
                "Source",
                format!("[Jump to message]({})", preview.jump_url),
                false,
            );
        if let Some(color) = preview.accent_color {
            embed = embed.colour(color);
        }

        channel
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await?;

        Ok(())
    }
}

/// Receives gateway events and feeds them through the handler registry.
struct Handler {
    registry: HandlerRegistry,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            "Logged in as {} ({} guilds)",
            ready.user.name,
            ready.guilds.len()
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        debug!("Message {} in channel {}", msg.id, msg.channel_id);

        let inbound = InboundMessage {
            content: msg.content.clone(),
            guild_id: msg.guild_id.map(|id| id.to_string()),
            channel_id: msg.channel_id.to_string(),
            message_id: msg.id.to_string(),
            author_name: msg.author.name.clone(),
            author_is_bot: msg.author.bot,
        };
        let session = DiscordSession::new(ctx.http.clone(), ctx.cache.clone());

        self.registry
            .dispatch(EventKind::MessageCreate, &session, &inbound)
            .await;
    }
}

/// Connect to the gateway and run until the process stops.
pub async fn run(config: &Config, registry: HandlerRegistry) -> Result<()> {
    info!("Starting Discord client...");

    let mut client = Client::builder(&config.discord.bot_token, intents())
        .event_handler(Handler { registry })
        .await
        .context("Failed to build Discord client")?;

    client
        .start()
        .await
        .context("Discord client stopped with an error")?;

    Ok(())
}
