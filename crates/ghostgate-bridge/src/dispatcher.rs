//! Per-session backend event dispatcher.
//!
//! One dispatcher task runs per logged-in principal. It waits for the login
//! to hand over the backend, bootstraps the protocol view (nick, `&users`,
//! `&messages`, joined channels) and then consumes the session's event queue
//! strictly in order until the backend logs out. Ending the loop parts the
//! principal from every channel and unbinds it.
//!
//! # State machine
//!
//! ```text
//! Unauthenticated -> Bootstrapping -> Live -> Terminated
//!                         |                       ^
//!                         +--- login failed ------+
//! ```
//!
//! Failures while handling an event are logged and the event is dropped;
//! they never stop the loop.

use std::sync::Arc;

use ghostgate_core::{
    Backend, BackendEvent, ChannelId, ChannelKind, ChannelMessage, DirectMessage, FileInfo,
    MessageKind, MessageStyle, Presence, UserId, UserInfo,
    naming::{MESSAGES_CHANNEL, SYSTEM_NICK, USERS_CHANNEL, sanitize_nick},
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, warn};

use crate::{
    context::SessionContext,
    message::{Numeric, Outbound, Prefix},
    registry::{Channel, ChannelKey, Member},
    render::{RenderInput, render_lines},
    sync::ChannelSynchronizer,
};

/// Lifecycle of a session's dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    /// No login attempted yet, or the last session ended.
    #[default]
    Unauthenticated,
    /// Waiting for the backend and building the initial view.
    Bootstrapping,
    /// Handling events.
    Live,
    /// The event loop has exited.
    Terminated,
}

/// Turns backend events into protocol messages for one principal.
pub struct EventDispatcher {
    ctx: SessionContext,
    backend: Arc<dyn Backend>,
    sync: ChannelSynchronizer,
}

impl EventDispatcher {
    /// Create a dispatcher bound to a logged-in backend.
    pub fn new(ctx: SessionContext, backend: Arc<dyn Backend>) -> Self {
        let sync = ChannelSynchronizer::new(ctx.clone());
        Self { ctx, backend, sync }
    }

    /// Run a dispatcher task to completion.
    ///
    /// Waits for `ready` to deliver the backend. If the sender is dropped the
    /// login failed and the task terminates without touching any state.
    pub async fn run(
        ctx: SessionContext,
        ready: oneshot::Receiver<Arc<dyn Backend>>,
        mut events: mpsc::Receiver<BackendEvent>,
        state: Arc<watch::Sender<DispatchState>>,
    ) {
        state.send_replace(DispatchState::Bootstrapping);

        let Ok(backend) = ready.await else {
            debug!(session = ctx.principal.session_id(), "login abandoned");
            state.send_replace(DispatchState::Terminated);
            return;
        };

        let dispatcher = Self::new(ctx, backend);
        dispatcher.bootstrap().await;
        state.send_replace(DispatchState::Live);

        while let Some(event) = events.recv().await {
            if !dispatcher.dispatch(event).await {
                break;
            }
        }

        // A newer login may already have rebound the principal
        if dispatcher.ctx.principal.is_bound_to(&dispatcher.backend) {
            debug!(session = dispatcher.ctx.principal.session_id(), "backend session ended");
            dispatcher.ctx.end_session();
        }
        debug!(session = dispatcher.ctx.principal.session_id(), "dispatcher terminated");
        state.send_replace(DispatchState::Terminated);
    }

    /// Build the initial protocol view after login.
    pub async fn bootstrap(&self) {
        let principal = &self.ctx.principal;
        let registry = &self.ctx.registry;

        match self.backend.me().await {
            Ok(me) => {
                let nick = sanitize_nick(&me.nick);
                if nick != principal.nick() {
                    let old = principal.set_nick(&nick);
                    registry.rename_principal(principal.session_id(), &nick);
                    principal.send(Outbound::Nick { old, new_nick: nick });
                }
            },
            Err(err) => warn!(error = %err, "failed to fetch own account"),
        }

        let users = self.backend.users().await.unwrap_or_else(|err| {
            warn!(error = %err, "failed to fetch contacts");
            Vec::new()
        });
        let ghosts: Vec<Member> = users
            .iter()
            .filter(|info| !info.me)
            .map(|info| registry.get_or_create_ghost(info).member())
            .collect();
        if !ghosts.is_empty() {
            debug!(count = ghosts.len(), "adding contacts to &users");
            registry.batch_join(&ChannelKey::users(), &ghosts);
            self.sync.join_principal(&ChannelKey::users(), USERS_CHANNEL);
        }

        self.sync.join_principal(&ChannelKey::messages(), MESSAGES_CHANNEL);

        if self.ctx.settings.skip_join_on_start {
            debug!("skipping channel join on start");
            return;
        }

        let channels = match self.backend.channels().await {
            Ok(channels) => channels,
            Err(err) => {
                warn!(error = %err, "failed to list channels");
                return;
            },
        };
        for channel in channels.iter().filter(|channel| !channel.direct) {
            debug!(channel = %channel.name, id = %channel.id, "bootstrapping channel");
            self.sync.sync(self.backend.as_ref(), &channel.id, &channel.name).await;
        }
    }

    /// Handle one event, including any events it expands into.
    ///
    /// Returns false once the backend has logged out.
    pub async fn dispatch(&self, event: BackendEvent) -> bool {
        let mut next = Some(event);
        while let Some(event) = next.take() {
            if event == BackendEvent::Logout {
                debug!("backend logged out");
                return false;
            }
            debug!(event = event.name(), "dispatching");
            next = self.handle(event).await;
        }
        true
    }

    async fn handle(&self, event: BackendEvent) -> Option<BackendEvent> {
        match event {
            BackendEvent::ChannelMessage(message) => self.channel_message(&message).await,
            BackendEvent::DirectMessage(message) => self.direct_message(&message),
            BackendEvent::ChannelTopic { channel_id, user_id, text } => {
                self.channel_topic(&channel_id, &user_id, &text).await;
            },
            BackendEvent::ChannelAdd { channel_id, added, adder } => {
                self.channel_add(&channel_id, &added, adder.as_ref()).await;
            },
            BackendEvent::ChannelRemove { channel_id, removed, remover } => {
                self.channel_remove(&channel_id, &removed, remover.as_ref()).await;
            },
            BackendEvent::ChannelCreate { channel_id } => self.channel_create(&channel_id).await,
            BackendEvent::ChannelDelete { channel_id } => self.channel_delete(&channel_id).await,
            BackendEvent::UserUpdate { user } => self.user_update(&user),
            BackendEvent::StatusChange { user_id, status } => self.status_change(&user_id, status),
            BackendEvent::ReactionAdd {
                channel_id,
                channel_kind,
                message_id,
                sender,
                reaction,
                message,
            } => {
                if self.ctx.settings.hide_reactions {
                    debug!(reaction = %reaction, "hiding reaction");
                    return None;
                }
                let text = format!("reaction changed {reaction}{message}");
                return Some(match channel_kind {
                    ChannelKind::Direct => BackendEvent::DirectMessage(DirectMessage {
                        channel_id,
                        sender,
                        receiver: self.ctx.principal.me().unwrap_or_default(),
                        parent_id: Some(message_id.clone()),
                        message_id,
                        kind: MessageKind::Reaction,
                        text,
                    }),
                    ChannelKind::Group => BackendEvent::ChannelMessage(ChannelMessage {
                        channel_id,
                        channel_kind,
                        sender,
                        parent_id: Some(message_id.clone()),
                        message_id,
                        kind: MessageKind::Reaction,
                        style: MessageStyle::Normal,
                        text,
                    }),
                });
            },
            BackendEvent::File { channel_id, channel_kind, sender, receiver, files } => {
                self.file(&channel_id, channel_kind, &sender, receiver.as_ref(), &files).await;
            },
            BackendEvent::Logout => {},
        }
        None
    }

    /// Channel a message from `sender` in `channel_id` is shown in.
    ///
    /// Joins the sender's ghost, syncs the channel on first use when the
    /// policy allows it, and falls back to `&messages` otherwise.
    async fn message_channel(
        &self,
        channel_id: &ChannelId,
        sender: &UserInfo,
    ) -> (ChannelKey, String) {
        let registry = &self.ctx.registry;
        let Channel { key, name, .. } = self.channel(channel_id).await;

        if !sender.me {
            let ghost = registry.get_or_create_ghost(sender);
            if !registry.is_member(&key, &ghost.member()) {
                debug!(nick = %ghost.nick, channel = %name, "sender not in channel, joining");
                self.sync.join_members(&key, &name, &[ghost.member()]);
            }
        }

        if self.ctx.settings.policy.may_join(&name) {
            if !registry.is_member(&key, &self.ctx.principal.member()) {
                self.sync.sync(self.backend.as_ref(), channel_id, &name).await;
            }
            return (key, name);
        }

        (ChannelKey::messages(), MESSAGES_CHANNEL.to_string())
    }

    /// Registry channel for a backend group, created with the backend's
    /// name on first use.
    async fn channel(&self, channel_id: &ChannelId) -> Channel {
        let key = ChannelKey::backend(channel_id);
        if let Some(channel) = self.ctx.registry.channel(&key) {
            return channel;
        }
        let name = self.backend.channel_name(channel_id).await;
        self.ctx.registry.ensure_channel(&key, &name)
    }

    fn sender_prefix(&self, sender: &UserInfo) -> Prefix {
        if sender.me {
            self.ctx.principal.prefix()
        } else {
            self.ctx.registry.get_or_create_ghost(sender).prefix()
        }
    }

    async fn channel_message(&self, message: &ChannelMessage) {
        let (key, target) = self.message_channel(&message.channel_id, &message.sender).await;

        let mut from = self.sender_prefix(&message.sender);
        if message.channel_kind != ChannelKind::Direct && key == ChannelKey::messages() {
            let origin = self.channel(&message.channel_id).await;
            from.nick = format!("{}/{}", from.nick, origin.name);
        }

        let lines = render_lines(
            &self.ctx,
            RenderInput {
                thread_key: &message.channel_id,
                message_id: &message.message_id,
                parent_id: message.parent_id.as_ref(),
                kind: message.kind,
                text: &message.text,
                tagged: self.ctx.principal.nick() != SYSTEM_NICK,
            },
        );

        for text in lines {
            let outbound = match message.style {
                MessageStyle::Normal => {
                    Outbound::Privmsg { from: from.clone(), target: target.clone(), text }
                },
                MessageStyle::Notice => {
                    Outbound::Notice { from: from.clone(), target: target.clone(), text }
                },
            };
            self.ctx.principal.send(outbound);
        }
    }

    /// Sender and recipient of a direct-chat line.
    fn direct_route(&self, sender: &UserInfo, receiver: Option<&UserInfo>) -> (Prefix, String) {
        let principal = &self.ctx.principal;
        if !sender.me {
            return (self.sender_prefix(sender), principal.nick());
        }
        let target = match receiver {
            Some(receiver) if !receiver.me => {
                self.ctx.registry.get_or_create_ghost(receiver).nick
            },
            _ => principal.nick(),
        };
        (principal.prefix(), target)
    }

    fn direct_message(&self, message: &DirectMessage) {
        let peer = if message.sender.me { &message.receiver.id } else { &message.sender.id };
        let thread_key = ChannelId::new(peer.as_str());

        let lines = render_lines(
            &self.ctx,
            RenderInput {
                thread_key: &thread_key,
                message_id: &message.message_id,
                parent_id: message.parent_id.as_ref(),
                kind: message.kind,
                text: &message.text,
                tagged: true,
            },
        );

        let (from, target) = self.direct_route(&message.sender, Some(&message.receiver));
        for text in lines {
            self.ctx.principal.send(Outbound::Privmsg {
                from: from.clone(),
                target: target.clone(),
                text,
            });
        }
    }

    async fn channel_topic(&self, channel_id: &ChannelId, user_id: &UserId, text: &str) {
        let principal = &self.ctx.principal;
        let registry = &self.ctx.registry;

        let is_me = principal.me().is_some_and(|me| &me.id == user_id);
        let setter = if is_me {
            principal.prefix()
        } else if let Some(ghost) = registry.ghost(user_id) {
            ghost.prefix()
        } else {
            error!(user = %user_id, channel = %channel_id, "topic change failure: user not found");
            return;
        };

        let channel = self.channel(channel_id).await;
        let key = channel.key;
        registry.set_topic(&key, text);
        if registry.is_member(&key, &principal.member()) {
            principal.send(Outbound::Topic {
                setter,
                channel: channel.name,
                topic: text.to_string(),
            });
        }
    }

    fn announce(&self, key: &ChannelKey, channel: &str, text: String) {
        if self.ctx.registry.is_member(key, &self.ctx.principal.member()) {
            self.ctx.principal.send(Outbound::Privmsg {
                from: Prefix::new(SYSTEM_NICK, ""),
                target: channel.to_string(),
                text,
            });
        }
    }

    /// Nick to credit in a membership notice, if one should be shown.
    fn announcer(subject: &UserInfo, actor: Option<&UserInfo>) -> Option<String> {
        actor
            .filter(|actor| actor.nick != subject.nick && actor.nick != SYSTEM_NICK)
            .map(|actor| actor.nick.clone())
    }

    async fn channel_add(
        &self,
        channel_id: &ChannelId,
        added: &[UserInfo],
        adder: Option<&UserInfo>,
    ) {
        let channel = self.channel(channel_id).await;
        let key = channel.key.clone();

        for user in added {
            if user.me {
                self.sync.sync(self.backend.as_ref(), channel_id, &channel.name).await;
            } else {
                let ghost = self.ctx.registry.get_or_create_ghost(user);
                self.sync.join_members(&key, &channel.name, &[ghost.member()]);
            }

            if let Some(actor) = Self::announcer(user, adder) {
                let text = format!("added {} to the channel by {actor}", user.nick);
                self.announce(&key, &channel.name, text);
            }
        }
    }

    async fn channel_remove(
        &self,
        channel_id: &ChannelId,
        removed: &[UserInfo],
        remover: Option<&UserInfo>,
    ) {
        let principal = &self.ctx.principal;
        let registry = &self.ctx.registry;
        let channel = self.channel(channel_id).await;
        let key = channel.key.clone();

        for user in removed {
            if !user.me {
                let ghost = registry.get_or_create_ghost(user);
                let visible = registry.is_member(&key, &principal.member());
                if registry.part(&key, &ghost.member()) && visible {
                    principal.send(Outbound::Part {
                        who: ghost.prefix(),
                        channel: channel.name.clone(),
                    });
                }
            }

            if let Some(actor) = Self::announcer(user, remover) {
                let text = format!("removed {} from the channel by {actor}", user.nick);
                self.announce(&key, &channel.name, text);
            }

            if user.me {
                self.part_principal(&key, &channel.name);
            }
        }
    }

    fn part_principal(&self, key: &ChannelKey, channel: &str) {
        let principal = &self.ctx.principal;
        if self.ctx.registry.part(key, &principal.member()) {
            principal.send(Outbound::Part { who: principal.prefix(), channel: channel.to_string() });
        }
    }

    async fn channel_create(&self, channel_id: &ChannelId) {
        if let Err(err) = self.backend.update_channels().await {
            warn!(channel = %channel_id, error = %err, "failed to refresh channels");
        }
        let name = self.backend.channel_name(channel_id).await;
        debug!(channel = %name, id = %channel_id, "channel created, syncing");
        self.sync.sync(self.backend.as_ref(), channel_id, &name).await;
    }

    async fn channel_delete(&self, channel_id: &ChannelId) {
        let channels = match self.backend.channels().await {
            Ok(channels) => channels,
            Err(err) => {
                warn!(channel = %channel_id, error = %err, "failed to list channels");
                return;
            },
        };
        if channels.iter().any(|channel| &channel.id == channel_id) {
            debug!(channel = %channel_id, "channel still listed, staying");
            return;
        }

        let key = ChannelKey::backend(channel_id);
        if let Some(channel) = self.ctx.registry.channel(&key) {
            debug!(channel = %channel.name, "channel deleted, parting");
            self.part_principal(&key, &channel.name);
        }
    }

    fn user_update(&self, user: &UserInfo) {
        if user.me {
            debug!("ignoring update of own account");
            return;
        }
        let update = self.ctx.registry.update_ghost(user);
        if let Some(rename) = update.renamed {
            self.ctx
                .principal
                .send(Outbound::Nick { old: rename.old_prefix, new_nick: rename.new_nick });
        }
    }

    fn status_change(&self, user_id: &UserId, status: Presence) {
        let principal = &self.ctx.principal;
        if !principal.me().is_some_and(|me| &me.id == user_id) {
            return;
        }

        let numeric = match status {
            Presence::Online => Numeric::UnAway,
            Presence::Away => Numeric::NowAway,
            // Ignored to avoid flapping between away and back
            Presence::Offline => {
                debug!("ignoring offline status");
                return;
            },
        };
        if principal.set_away(numeric == Numeric::NowAway) {
            principal.send(Outbound::Reply { numeric, nick: principal.nick() });
        }
    }

    async fn file(
        &self,
        channel_id: &ChannelId,
        channel_kind: ChannelKind,
        sender: &UserInfo,
        receiver: Option<&UserInfo>,
        files: &[FileInfo],
    ) {
        let (from, target) = match channel_kind {
            ChannelKind::Direct => self.direct_route(sender, receiver),
            ChannelKind::Group => {
                let (_, target) = self.message_channel(channel_id, sender).await;
                (self.sender_prefix(sender), target)
            },
        };

        for file in files {
            self.ctx.principal.send(Outbound::Privmsg {
                from: from.clone(),
                target: target.clone(),
                text: format!("download file - {}", file.name),
            });
        }
    }
}
