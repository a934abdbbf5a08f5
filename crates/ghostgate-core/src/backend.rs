//! Backend adapter contract.
//!
//! The gateway never speaks a backend's wire protocol itself. An adapter
//! implements [`Backend`] for one logged-in account and [`Connector`] to
//! establish such a session. Both traits are object safe so sessions can hold
//! `Arc<dyn Backend>` regardless of the concrete adapter.
//!
//! Operations that a backend may not support have default implementations
//! returning [`BackendError::Unsupported`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::{BackendError, BackendEvent, ChannelId, ChannelInfo, MessageId, UserId, UserInfo};

/// Sending half of a session's event queue, handed to the adapter.
pub type EventSender = mpsc::Sender<BackendEvent>;

/// Login/password pair. Only lives for the duration of a login call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Account login (usually an email address). Empty selects the default
    /// account.
    pub login: String,
    /// Password. Empty reuses an already configured account.
    pub password: String,
}

impl Credentials {
    /// Build credentials from a login and password.
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self { login: login.into(), password: password.into() }
    }

    /// Server part of the login address, if it has one.
    pub fn server(&self) -> Option<&str> {
        self.login.rsplit_once('@').map(|(_, server)| server).filter(|s| !s.is_empty())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("login", &self.login).field("password", &"***").finish()
    }
}

/// Where an outgoing message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTarget {
    /// A backend group.
    Channel(ChannelId),
    /// A backend user (direct chat).
    User(UserId),
}

/// A message fetched from backend history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Author.
    pub sender: UserInfo,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// Message text.
    pub text: String,
    /// Quoted message, if any.
    pub parent_id: Option<MessageId>,
    /// System/info message (rendered as coming from `system`).
    pub is_info: bool,
    /// Attached file path.
    pub file: Option<String>,
    /// Sender name override (bots, bridges).
    pub override_sender: Option<String>,
}

impl HistoryMessage {
    /// Text with the attachment link and sender override applied.
    pub fn rendered_text(&self) -> String {
        let mut text = match &self.file {
            Some(file) if self.text.is_empty() => format!("file://{file}"),
            Some(file) => format!("file://{file}\n{}", self.text),
            None => self.text.clone(),
        };
        if let Some(name) = self.override_sender.as_deref().filter(|n| !n.is_empty()) {
            text = format!("<{name}> {text}");
        }
        text
    }
}

/// A message search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Author display name.
    pub author: String,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// Message text (may span lines).
    pub text: String,
}

/// One logged-in backend account.
///
/// Methods are awaited inline by the session that owns the account; a hung
/// call stalls only that session.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend protocol name. Also namespaces configuration.
    fn protocol(&self) -> &str;

    /// Whether the backend connection is up.
    fn is_connected(&self) -> bool;

    /// The logged-in account.
    async fn me(&self) -> Result<UserInfo, BackendError>;

    /// Tear down the backend session. The adapter then emits
    /// [`BackendEvent::Logout`].
    async fn logout(&self) -> Result<(), BackendError>;

    /// Groups the account is currently a member of.
    async fn channels(&self) -> Result<Vec<ChannelInfo>, BackendError>;

    /// Resolve a channel by id.
    async fn channel(&self, id: &ChannelId) -> Result<ChannelInfo, BackendError>;

    /// Protocol channel name for an id. Falls back to the raw id.
    async fn channel_name(&self, id: &ChannelId) -> String {
        match self.channel(id).await {
            Ok(info) => info.name,
            Err(_) => id.to_string(),
        }
    }

    /// Current members of a channel.
    async fn channel_members(&self, id: &ChannelId) -> Result<Vec<UserInfo>, BackendError>;

    /// Channel display name used as the protocol topic.
    async fn topic(&self, id: &ChannelId) -> Result<String, BackendError>;

    /// Rename a channel.
    async fn set_topic(&self, id: &ChannelId, text: &str) -> Result<(), BackendError>;

    /// Every contact known to the account.
    async fn users(&self) -> Result<Vec<UserInfo>, BackendError>;

    /// Resolve a user id to its full profile.
    async fn user(&self, id: &UserId) -> Result<UserInfo, BackendError>;

    /// Send a message, optionally as a reply to `parent`. Returns the new
    /// message id.
    async fn send_message(
        &self,
        target: &MessageTarget,
        parent: Option<&MessageId>,
        text: &str,
    ) -> Result<MessageId, BackendError>;

    /// Presence or last-seen description for a user.
    async fn presence(&self, id: &UserId) -> Result<String, BackendError>;

    /// Leave a group.
    async fn leave_channel(&self, id: &ChannelId) -> Result<(), BackendError>;

    /// Set the account's own display name.
    async fn set_nick(&self, name: &str) -> Result<(), BackendError>;

    /// Add a member to a group.
    async fn add_member(&self, channel: &ChannelId, user: &UserId) -> Result<(), BackendError> {
        let _ = (channel, user);
        Err(BackendError::Unsupported("adding members".into()))
    }

    /// Remove a member from a group.
    async fn remove_member(&self, channel: &ChannelId, user: &UserId) -> Result<(), BackendError> {
        let _ = (channel, user);
        Err(BackendError::Unsupported("removing members".into()))
    }

    /// Map a free-form channel reference (name or `name|id`) and team to a
    /// canonical channel id.
    fn channel_id_for(&self, reference: &str, team_id: &str) -> ChannelId;

    /// Direct chat with a user.
    async fn direct_channel_id(
        &self,
        user: &UserId,
        team_id: &str,
    ) -> Result<ChannelId, BackendError>;

    /// Last `limit` messages of a channel, oldest first.
    async fn history(
        &self,
        channel: &ChannelId,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, BackendError>;

    /// Free-text message search, newest first.
    async fn search_messages(&self, query: &str) -> Result<Vec<SearchHit>, BackendError>;

    /// Free-text user search.
    async fn search_users(&self, query: &str) -> Result<Vec<UserInfo>, BackendError>;

    /// React to a message.
    async fn add_reaction(&self, message: &MessageId, reaction: &str) -> Result<(), BackendError> {
        let _ = (message, reaction);
        Err(BackendError::Unsupported("reactions".into()))
    }

    /// Remove a reaction.
    async fn remove_reaction(
        &self,
        message: &MessageId,
        reaction: &str,
    ) -> Result<(), BackendError> {
        let _ = (message, reaction);
        Err(BackendError::Unsupported("reactions".into()))
    }

    /// Delete a message.
    async fn delete_message(&self, message: &MessageId) -> Result<(), BackendError> {
        let _ = message;
        Err(BackendError::Unsupported("deleting messages".into()))
    }

    /// Replace a message's text.
    async fn edit_message(&self, message: &MessageId, text: &str) -> Result<(), BackendError> {
        let _ = (message, text);
        Err(BackendError::Unsupported("editing messages".into()))
    }

    /// Refresh the adapter's channel list after a create event.
    async fn update_channels(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Establishes backend sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Backend protocol name, used to pick the configuration section.
    fn protocol(&self) -> &str;

    /// Log in and start delivering events into `events`.
    ///
    /// Failures caused by the credentials must be reported as
    /// [`BackendError::Authentication`].
    async fn connect(
        &self,
        credentials: Credentials,
        events: EventSender,
    ) -> Result<Arc<dyn Backend>, BackendError>;
}
