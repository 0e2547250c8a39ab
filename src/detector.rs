use std::sync::LazyLock;

use regex::Regex;

/// Longest link worth keeping: scheme + host + three snowflake ids.
/// Anything past this (deep-link query fragments etc.) is noise.
const MAX_LINK_LEN: usize = 85;

const CANONICAL_PREFIX: &str = "https://discord.com/channels/";

// Both the bare host and the ptb./discordapp variants deep-link to
// messages; all of them collapse to the canonical form below.
static MESSAGE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://(ptb\.)?discord(app)?\.com/channels/")
        .unwrap_or_else(|_| Regex::new(r"$^").expect("fallback regex compiles"))
});

/// Scan free-form chat text for the first Discord message link that the
/// author did not suppress with `<...>`. Returns the link normalized to
/// the canonical host and truncated to [`MAX_LINK_LEN`], or `None`.
///
/// Pure: no side effects, no I/O.
pub fn find_message_link(content: &str) -> Option<String> {
    for m in MESSAGE_LINK_RE.find_iter(content) {
        let token_start = content[..m.start()]
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let token_end = content[m.start()..]
            .find(char::is_whitespace)
            .map(|i| m.start() + i)
            .unwrap_or(content.len());

        // `<link>` means the author opted out of the native embed;
        // do not second-guess that by posting our own preview.
        let token = &content[token_start..token_end];
        if token.starts_with('<') && token.ends_with('>') {
            continue;
        }

        let mut link = format!("{}{}", CANONICAL_PREFIX, &content[m.end()..token_end]);
        if link.len() > MAX_LINK_LEN {
            let mut end = MAX_LINK_LEN;
            while !link.is_char_boundary(end) {
                end -= 1;
            }
            link.truncate(end);
        }

        return Some(link);
    }

    None
}
