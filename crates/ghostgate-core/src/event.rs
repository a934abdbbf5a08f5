//! Backend events and the data model they carry.
//!
//! This module defines [`BackendEvent`], the closed set of notifications a
//! backend adapter delivers to a session's dispatcher. Events are produced by
//! the adapter from its own delivery context and consumed exactly once, in
//! arrival order.

use crate::{ChannelId, MessageId, UserId};

/// A backend user as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserInfo {
    /// Backend user identifier.
    pub id: UserId,
    /// Nickname as reported by the backend (not yet sanitized).
    pub nick: String,
    /// Real name.
    pub real_name: String,
    /// Host part of the protocol prefix.
    pub host: String,
    /// Display name.
    pub display_name: String,
    /// Team or workspace the user belongs to.
    pub team_id: String,
    /// Keywords that count as a mention of this user.
    pub mention_keys: Vec<String>,
    /// True when this is the principal's own backend account.
    pub me: bool,
}

impl UserInfo {
    /// Minimal user with an id and nick, used by adapters and tests.
    pub fn new(id: impl Into<UserId>, nick: impl Into<String>) -> Self {
        Self { id: id.into(), nick: nick.into(), ..Self::default() }
    }

    /// Mark this user as the principal's own account.
    #[must_use]
    pub fn as_me(mut self) -> Self {
        self.me = true;
        self
    }
}

/// A backend group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelInfo {
    /// Backend channel identifier.
    pub id: ChannelId,
    /// Protocol channel name (see [`crate::naming::channel_name`]).
    pub name: String,
    /// Team or workspace the channel belongs to.
    pub team_id: String,
    /// True for one-to-one chats.
    pub direct: bool,
}

/// Whether a backend chat is a one-to-one conversation or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelKind {
    /// Direct (one-to-one) chat.
    Direct,
    /// Group chat.
    #[default]
    Group,
}

/// What happened to the message an event refers to.
///
/// Edits, deletions and reactions reuse the tag of the original message;
/// everything else gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    /// New message.
    #[default]
    Posted,
    /// Existing message was edited.
    Edited,
    /// Existing message was deleted.
    Deleted,
    /// Reactions on an existing message changed.
    Reaction,
}

impl MessageKind {
    /// True when the event modifies an already tagged message.
    pub fn modifies_existing(self) -> bool {
        matches!(self, Self::Edited | Self::Deleted | Self::Reaction)
    }
}

/// How a channel message is rendered on the protocol side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageStyle {
    /// Regular message.
    #[default]
    Normal,
    /// Notice.
    Notice,
}

/// Presence reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Actively online.
    Online,
    /// Away or idle.
    Away,
    /// Disconnected. Ignored for the principal to avoid away flapping.
    Offline,
}

impl Presence {
    /// Parse a backend status string. Unknown values count as away.
    pub fn parse(status: &str) -> Self {
        match status {
            "online" => Self::Online,
            "offline" => Self::Offline,
            _ => Self::Away,
        }
    }
}

/// Attachment on a file event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// File name shown to the user.
    pub name: String,
}

/// Message posted in a backend group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelMessage {
    /// Channel the message was posted in.
    pub channel_id: ChannelId,
    /// Direct or group chat.
    pub channel_kind: ChannelKind,
    /// Author.
    pub sender: UserInfo,
    /// Message identifier.
    pub message_id: MessageId,
    /// Quoted or thread parent message.
    pub parent_id: Option<MessageId>,
    /// What happened to the message.
    pub kind: MessageKind,
    /// Message or notice.
    pub style: MessageStyle,
    /// Message text.
    pub text: String,
}

/// One-to-one message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectMessage {
    /// Direct chat identifier.
    pub channel_id: ChannelId,
    /// Author.
    pub sender: UserInfo,
    /// Recipient.
    pub receiver: UserInfo,
    /// Message identifier.
    pub message_id: MessageId,
    /// Quoted or thread parent message.
    pub parent_id: Option<MessageId>,
    /// What happened to the message.
    pub kind: MessageKind,
    /// Message text.
    pub text: String,
}

/// Events delivered by a backend adapter to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Message in a group.
    ChannelMessage(ChannelMessage),

    /// One-to-one message.
    DirectMessage(DirectMessage),

    /// Group topic changed.
    ChannelTopic {
        /// Affected channel.
        channel_id: ChannelId,
        /// User who changed the topic.
        user_id: UserId,
        /// New topic.
        text: String,
    },

    /// Members added to a group.
    ChannelAdd {
        /// Affected channel.
        channel_id: ChannelId,
        /// Added members.
        added: Vec<UserInfo>,
        /// Who added them, when known.
        adder: Option<UserInfo>,
    },

    /// Members removed from a group.
    ChannelRemove {
        /// Affected channel.
        channel_id: ChannelId,
        /// Removed members.
        removed: Vec<UserInfo>,
        /// Who removed them, when known.
        remover: Option<UserInfo>,
    },

    /// A group was created.
    ChannelCreate {
        /// New channel.
        channel_id: ChannelId,
    },

    /// A group was deleted or left.
    ChannelDelete {
        /// Deleted channel.
        channel_id: ChannelId,
    },

    /// A user's profile changed.
    UserUpdate {
        /// Updated profile.
        user: UserInfo,
    },

    /// A user's presence changed.
    StatusChange {
        /// User whose status changed.
        user_id: UserId,
        /// New presence.
        status: Presence,
    },

    /// Reactions on a message changed.
    ReactionAdd {
        /// Channel of the reacted message.
        channel_id: ChannelId,
        /// Direct or group chat.
        channel_kind: ChannelKind,
        /// Reacted message.
        message_id: MessageId,
        /// User the reaction is attributed to.
        sender: UserInfo,
        /// Rendered reaction summary.
        reaction: String,
        /// Optional excerpt of the reacted message.
        message: String,
    },

    /// Files shared in a chat.
    File {
        /// Channel the files were posted in.
        channel_id: ChannelId,
        /// Direct or group chat.
        channel_kind: ChannelKind,
        /// Author.
        sender: UserInfo,
        /// Recipient for direct chats.
        receiver: Option<UserInfo>,
        /// Shared files.
        files: Vec<FileInfo>,
    },

    /// End of the backend session. Always the last event.
    Logout,
}

impl BackendEvent {
    /// Short event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChannelMessage(_) => "channel_message",
            Self::DirectMessage(_) => "direct_message",
            Self::ChannelTopic { .. } => "channel_topic",
            Self::ChannelAdd { .. } => "channel_add",
            Self::ChannelRemove { .. } => "channel_remove",
            Self::ChannelCreate { .. } => "channel_create",
            Self::ChannelDelete { .. } => "channel_delete",
            Self::UserUpdate { .. } => "user_update",
            Self::StatusChange { .. } => "status_change",
            Self::ReactionAdd { .. } => "reaction_add",
            Self::File { .. } => "file",
            Self::Logout => "logout",
        }
    }
}
