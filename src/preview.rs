use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::debug;

use crate::config::PreviewConfig;
use crate::platform::{ChatSession, InboundMessage, Preview};

static HYPERLINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]]*)\]\(([^()]*)\)")
        .unwrap_or_else(|_| Regex::new(r"$^").expect("fallback regex compiles"))
});

/// Identifier triplet carried in a message link's trailing path segments.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkIdentifiers {
    pub guild_id: String,
    pub channel_id: String,
    pub message_id: String,
}

impl LinkIdentifiers {
    /// A well-formed link carries exactly {guild}/{channel}/{message}
    /// after the `/channels/` prefix; anything else is malformed.
    fn parse(link: &str) -> Option<Self> {
        let (_, path) = link.split_once("/channels/")?;
        if path.split('/').count() != 3 || path.split('/').any(str::is_empty) {
            return None;
        }

        let mut segments = PreviewService::strip_link(link).into_iter();
        Some(Self {
            guild_id: segments.next()?,
            channel_id: segments.next()?,
            message_id: segments.next()?,
        })
    }
}

/// Turns a detected message link into a posted preview embed.
///
/// One instance is built at startup and handed to the message handler;
/// it keeps no state across calls. Every unresolvable or unauthorized
/// case degrades to "no preview appears" — the only failure that leaves
/// this service is a send error, which the dispatcher logs.
pub struct PreviewService {
    max_body_length: usize,
}

impl PreviewService {
    pub fn new(config: &PreviewConfig) -> Self {
        Self {
            max_body_length: config.max_body_length,
        }
    }

    /// Resolve `link` through `session` and post a preview embed into the
    /// channel `origin` was posted in.
    pub async fn generate_preview(
        &self,
        session: &dyn ChatSession,
        link: &str,
        origin: &InboundMessage,
    ) -> Result<()> {
        let Some(ids) = LinkIdentifiers::parse(link) else {
            debug!("Ignoring malformed message link: {}", link);
            return Ok(());
        };

        // DMs have no channel registry to authorize against.
        let Some(origin_guild) = origin.guild_id.as_deref() else {
            debug!("Ignoring message link posted outside a guild");
            return Ok(());
        };

        // Authorization boundary: the channel must be visible in the
        // *origin* guild's cache. Looking it up by the link's own guild id
        // would let a crafted link leak content across guilds.
        let Some(channel) = session.visible_channel(origin_guild, &ids.channel_id) else {
            debug!(
                "Channel {} is not visible in guild {}, skipping preview",
                ids.channel_id, origin_guild
            );
            return Ok(());
        };

        if !Self::verify_guild(origin, &ids.guild_id) {
            // The channel already resolved inside the origin guild, so the
            // content is visible to this community; the mismatched id is
            // just a stale or hand-edited link prefix.
            debug!(
                "Link guild {} differs from origin guild {}",
                ids.guild_id, origin_guild
            );
        }

        let target = match session.fetch_message(&channel.id, &ids.message_id).await {
            Ok(message) => message,
            Err(e) => {
                debug!("Could not fetch linked message {}: {:#}", ids.message_id, e);
                return Ok(());
            }
        };

        // Never preview automated content; previews of previews loop.
        if target.author_is_bot {
            debug!("Linked message {} is bot-authored, skipping", ids.message_id);
            return Ok(());
        }

        let accent_color = session
            .member_accent_color(origin_guild, &target.author_id)
            .await;

        let preview = Preview {
            author_name: target.author_name,
            author_icon_url: target.author_icon_url,
            accent_color,
            body: self.truncate_body(Self::serialize_hyperlinks(&target.content)),
            jump_url: format!(
                "https://discord.com/channels/{}/{}/{}",
                origin_guild, channel.id, ids.message_id
            ),
        };

        session.send_preview(&origin.channel_id, &preview).await
    }

    /// True iff `message` originates from the guild `guild_id` names.
    pub fn verify_guild(message: &InboundMessage, guild_id: &str) -> bool {
        message.guild_id.as_deref() == Some(guild_id)
    }

    /// Last three `/`-separated segments of `link`, in order. Segment
    /// shape is not validated here.
    pub fn strip_link(link: &str) -> Vec<String> {
        let segments: Vec<&str> = link.split('/').collect();
        let skip = segments.len().saturating_sub(3);
        segments.into_iter().skip(skip).map(str::to_string).collect()
    }

    /// Escape every Markdown hyperlink token `[label](url)` so forwarded
    /// content cannot render as a live link in the preview.
    pub fn serialize_hyperlinks(text: &str) -> String {
        HYPERLINK_RE
            .replace_all(text, r"\[${1}\]\(${2}\)")
            .into_owned()
    }

    fn truncate_body(&self, mut body: String) -> String {
        if body.len() > self.max_body_length {
            let mut end = self.max_body_length;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockSession;
    use crate::platform::LinkedMessage;

    fn make_service() -> PreviewService {
        PreviewService::new(&PreviewConfig {
            max_body_length: 4096,
        })
    }

    fn make_origin(guild_id: Option<&str>) -> InboundMessage {
        InboundMessage {
            content: "https://discord.com/channels/g1/c2/m3".to_string(),
            guild_id: guild_id.map(str::to_string),
            channel_id: "c1".to_string(),
            message_id: "m1".to_string(),
            author_name: "poster".to_string(),
            author_is_bot: false,
        }
    }

    fn make_target(author_is_bot: bool) -> LinkedMessage {
        LinkedMessage {
            content: "the linked words".to_string(),
            author_id: "u9".to_string(),
            author_name: "original author".to_string(),
            author_icon_url: Some("https://cdn.example/avatar.png".to_string()),
            author_is_bot,
        }
    }

    fn make_session() -> MockSession {
        let mut session = MockSession::new();
        session.add_channel("g1", "c2", "general");
        session.add_message("c2", "m3", make_target(false));
        session.add_color("g1", "u9", 0xFF_FF_FF);
        session
    }

    #[test]
    fn test_strip_link_returns_last_three_segments() {
        let segments = PreviewService::strip_link(
            "https://ptb.discordapp.com/channels/240880736851329024/518817917438001152/732711501345062982",
        );

        assert_eq!(
            segments,
            vec![
                "240880736851329024".to_string(),
                "518817917438001152".to_string(),
                "732711501345062982".to_string(),
            ]
        );
    }

    #[test]
    fn test_verify_guild() {
        let origin = make_origin(Some("RANDOM_GUILD_ID"));

        assert!(PreviewService::verify_guild(&origin, "RANDOM_GUILD_ID"));
        assert!(!PreviewService::verify_guild(&origin, "OTHER_GUILD_ID"));
        assert!(!PreviewService::verify_guild(&make_origin(None), "RANDOM_GUILD_ID"));
    }

    #[test]
    fn test_serialize_hyperlinks_leaves_plain_text_alone() {
        assert_eq!(
            PreviewService::serialize_hyperlinks("I am the night"),
            "I am the night"
        );
        assert_eq!(PreviewService::serialize_hyperlinks(""), "");
    }

    #[test]
    fn test_serialize_hyperlinks_escapes_links() {
        assert_eq!(
            PreviewService::serialize_hyperlinks("Do you feel lucky, [punk](punkrock.com)?"),
            r"Do you feel lucky, \[punk\]\(punkrock.com\)?"
        );
    }

    #[test]
    fn test_serialize_hyperlinks_escapes_every_occurrence() {
        assert_eq!(
            PreviewService::serialize_hyperlinks("[Link1](l1.com) and [Link2](l2.com)"),
            r"\[Link1\]\(l1.com\) and \[Link2\]\(l2.com\)"
        );
    }

    #[test]
    fn test_serialize_hyperlinks_escapes_empty_parts() {
        assert_eq!(PreviewService::serialize_hyperlinks("[]()"), r"\[\]\(\)");
        assert_eq!(
            PreviewService::serialize_hyperlinks("[half]()"),
            r"\[half\]\(\)"
        );
        assert_eq!(
            PreviewService::serialize_hyperlinks("[](half)"),
            r"\[\]\(half\)"
        );
    }

    #[tokio::test]
    async fn test_preview_sent_for_valid_link() {
        let session = make_session();
        let origin = make_origin(Some("g1"));

        make_service()
            .generate_preview(&session, "https://discord.com/channels/g1/c2/m3", &origin)
            .await
            .unwrap();

        let sent = session.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "c1");
        assert_eq!(sent[0].1.author_name, "original author");
        assert_eq!(sent[0].1.accent_color, Some(0xFF_FF_FF));
        assert_eq!(sent[0].1.jump_url, "https://discord.com/channels/g1/c2/m3");
    }

    #[tokio::test]
    async fn test_preview_body_is_escaped() {
        let mut session = MockSession::new();
        session.add_channel("g1", "c2", "general");
        session.add_message(
            "c2",
            "m3",
            LinkedMessage {
                content: "see [docs](evil.example)".to_string(),
                ..make_target(false)
            },
        );

        make_service()
            .generate_preview(
                &session,
                "https://discord.com/channels/g1/c2/m3",
                &make_origin(Some("g1")),
            )
            .await
            .unwrap();

        let sent = session.sent();
        assert_eq!(sent[0].1.body, r"see \[docs\]\(evil.example\)");
    }

    #[tokio::test]
    async fn test_bot_author_sends_nothing() {
        let mut session = MockSession::new();
        session.add_channel("g1", "c2", "general");
        session.add_message("c2", "m3", make_target(true));

        make_service()
            .generate_preview(
                &session,
                "https://discord.com/channels/g1/c2/m3",
                &make_origin(Some("g1")),
            )
            .await
            .unwrap();

        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_channel_sends_nothing() {
        let session = MockSession::new();

        make_service()
            .generate_preview(
                &session,
                "https://discord.com/channels/g1/c2/m3",
                &make_origin(Some("g1")),
            )
            .await
            .unwrap();

        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_link_sends_nothing() {
        let session = make_session();

        for link in [
            "https://discord.com/channels/g1/c2",
            "https://discord.com/channels/g1/c2/",
            "https://discord.com/channels/g1//m3",
            "https://discord.com/notchannels/g1/c2/m3",
        ] {
            make_service()
                .generate_preview(&session, link, &make_origin(Some("g1")))
                .await
                .unwrap();
        }

        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_silent() {
        let mut session = MockSession::new();
        session.add_channel("g1", "c2", "general");

        make_service()
            .generate_preview(
                &session,
                "https://discord.com/channels/g1/c2/m3",
                &make_origin(Some("g1")),
            )
            .await
            .unwrap();

        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dm_origin_sends_nothing() {
        let session = make_session();

        make_service()
            .generate_preview(
                &session,
                "https://discord.com/channels/g1/c2/m3",
                &make_origin(None),
            )
            .await
            .unwrap();

        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn test_guild_mismatch_with_visible_channel_still_sends() {
        let session = make_session();

        make_service()
            .generate_preview(
                &session,
                "https://discord.com/channels/other-guild/c2/m3",
                &make_origin(Some("g1")),
            )
            .await
            .unwrap();

        assert_eq!(session.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_color_still_sends() {
        let mut session = MockSession::new();
        session.add_channel("g1", "c2", "general");
        session.add_message("c2", "m3", make_target(false));

        make_service()
            .generate_preview(
                &session,
                "https://discord.com/channels/g1/c2/m3",
                &make_origin(Some("g1")),
            )
            .await
            .unwrap();

        let sent = session.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.accent_color, None);
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let mut session = make_session();
        session.fail_sends = true;

        let result = make_service()
            .generate_preview(
                &session,
                "https://discord.com/channels/g1/c2/m3",
                &make_origin(Some("g1")),
            )
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_long_body_is_truncated() {
        let mut session = MockSession::new();
        session.add_channel("g1", "c2", "general");
        session.add_message(
            "c2",
            "m3",
            LinkedMessage {
                content: "x".repeat(5000),
                ..make_target(false)
            },
        );

        make_service()
            .generate_preview(
                &session,
                "https://discord.com/channels/g1/c2/m3",
                &make_origin(Some("g1")),
            )
            .await
            .unwrap();

        assert_eq!(session.sent()[0].1.body.len(), 4096);
    }
}
