//! Protocol-side naming of backend users and groups.

use crate::ChannelId;

/// Nick used for gateway-generated notices in channels.
pub const SYSTEM_NICK: &str = "system";

/// Synthetic channel holding every known backend contact.
pub const USERS_CHANNEL: &str = "&users";

/// Synthetic channel receiving messages from groups the principal has not
/// joined.
pub const MESSAGES_CHANNEL: &str = "&messages";

/// Longest protocol channel name derived from a backend group.
pub const MAX_CHANNEL_NAME: usize = 50;

const UNSAFE_NICK_CHARS: &[char] = &['!', '+', '%', '@', '&', '#', '$', ':', '\'', '"', '?', '*', ',', ' '];

/// Replace characters that are not allowed in protocol nicks with `-`.
pub fn sanitize_nick(nick: &str) -> String {
    nick.chars().map(|c| if UNSAFE_NICK_CHARS.contains(&c) { '-' } else { c }).collect()
}

/// Protocol channel name for a backend group: `#<name>|<id>`, lowercased
/// and at most [`MAX_CHANNEL_NAME`] characters.
pub fn channel_name(id: &ChannelId, name: &str) -> String {
    let suffix = format!("|{id}");
    let budget = MAX_CHANNEL_NAME.saturating_sub(1 + suffix.chars().count());
    let name: String = sanitize_nick(name).to_lowercase().chars().take(budget).collect();
    format!("#{name}{}", suffix.to_lowercase())
}
