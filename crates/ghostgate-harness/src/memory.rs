//! In-memory backend adapter.
//!
//! [`MemoryWorld`] is the fake chat service: contacts, groups, members,
//! topics, history and everything the gateway sent. Tests seed it, hand a
//! [`MemoryConnector`] to the gateway and push events with
//! [`MemoryWorld::emit`]. Every backend call is counted so tests can assert
//! how often the gateway asked for something.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ghostgate_core::{
    Backend, BackendError, BackendEvent, ChannelId, ChannelInfo, Connector, Credentials,
    EventSender, HistoryMessage, MessageId, MessageTarget, SearchHit, UserId, UserInfo,
    naming::channel_name,
};
use tracing::debug;

/// Protocol name of the in-memory backend.
pub const PROTOCOL: &str = "memory";

/// Cooperative yields granted to the dispatcher by [`MemoryWorld::settle`].
const SETTLE_ROUNDS: usize = 64;

/// A message the gateway relayed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Destination.
    pub target: MessageTarget,
    /// Text as sent.
    pub text: String,
}

#[derive(Debug, Clone)]
struct Group {
    info: ChannelInfo,
    display_name: String,
    members: Vec<UserId>,
}

#[derive(Debug, Default)]
struct State {
    me: UserInfo,
    users: Vec<UserInfo>,
    groups: Vec<Group>,
    presence: HashMap<UserId, String>,
    history: HashMap<ChannelId, Vec<HistoryMessage>>,
    search: Vec<SearchHit>,
    sent: Vec<SentMessage>,
    calls: HashMap<&'static str, usize>,
    events: Option<EventSender>,
    connected: bool,
    fail_members: bool,
    fail_me: bool,
}

impl State {
    fn count(&mut self, call: &'static str) {
        *self.calls.entry(call).or_default() += 1;
    }

    fn user(&self, id: &UserId) -> Option<UserInfo> {
        if *id == self.me.id {
            return Some(self.me.clone().as_me());
        }
        self.users.iter().find(|user| user.id == *id).cloned()
    }

    fn group(&self, id: &ChannelId) -> Result<&Group, BackendError> {
        self.groups
            .iter()
            .find(|group| group.info.id == *id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }
}

/// Shared state of the fake chat service. Cloning yields another handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    state: Arc<Mutex<State>>,
}

impl MemoryWorld {
    /// A world whose own account is `me`.
    pub fn new(me: UserInfo) -> Self {
        let world = Self::default();
        world.lock().me = me;
        world
    }

    /// Small world shared by the console and the integration tests.
    ///
    /// The account is `alice` (u0). Contacts are `bob` (u1) and `carol`
    /// (u2). Groups are `General` (c1, everyone) and `Random` (c2, with
    /// carol), plus a direct chat d1 with bob.
    pub fn sample() -> Self {
        let me = UserInfo {
            team_id: "t1".into(),
            mention_keys: vec!["alice".into(), "boss".into()],
            ..UserInfo::new("u0", "alice")
        };
        Self::new(me)
            .with_user(UserInfo { real_name: "Bob Builder".into(), ..UserInfo::new("u1", "bob") })
            .with_user(UserInfo { real_name: "Carol Danvers".into(), ..UserInfo::new("u2", "carol") })
            .with_group("c1", "General", &["u1", "u2"])
            .with_group("c2", "Random", &["u2"])
            .with_direct("d1", "u1")
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a contact.
    #[must_use]
    pub fn with_user(self, user: UserInfo) -> Self {
        self.lock().users.push(user);
        self
    }

    /// Add a group the account is a member of. `members` are user ids; the
    /// account itself is always added.
    #[must_use]
    pub fn with_group(self, id: &str, display_name: &str, members: &[&str]) -> Self {
        self.add_group(id, display_name, members);
        self
    }

    /// Add a group at runtime. Returns its protocol name.
    pub fn add_group(&self, id: &str, display_name: &str, members: &[&str]) -> String {
        let mut state = self.lock();
        let channel_id = ChannelId::new(id);
        let name = channel_name(&channel_id, display_name);
        let mut ids: Vec<UserId> = vec![state.me.id.clone()];
        ids.extend(members.iter().map(|member| UserId::new(*member)));
        let team_id = state.me.team_id.clone();

        state.groups.push(Group {
            info: ChannelInfo {
                id: channel_id,
                name: name.clone(),
                team_id,
                direct: false,
            },
            display_name: display_name.to_string(),
            members: ids,
        });
        name
    }

    /// Add a one-to-one chat with `peer`.
    #[must_use]
    pub fn with_direct(self, id: &str, peer: &str) -> Self {
        {
            let mut state = self.lock();
            let members = vec![state.me.id.clone(), UserId::new(peer)];
            let team_id = state.me.team_id.clone();
            state.groups.push(Group {
                info: ChannelInfo {
                    id: ChannelId::new(id),
                    name: id.to_string(),
                    team_id,
                    direct: true,
                },
                display_name: peer.to_string(),
                members,
            });
        }
        self
    }

    /// Remove a group from the account's group list.
    pub fn remove_group(&self, id: &str) {
        let channel_id = ChannelId::new(id);
        self.lock().groups.retain(|group| group.info.id != channel_id);
    }

    /// Set a user's presence string.
    #[must_use]
    pub fn with_presence(self, user: &str, status: &str) -> Self {
        self.lock().presence.insert(UserId::new(user), status.to_string());
        self
    }

    /// Append a history message to a channel.
    #[must_use]
    pub fn with_history(self, channel: &str, message: HistoryMessage) -> Self {
        self.lock().history.entry(ChannelId::new(channel)).or_default().push(message);
        self
    }

    /// Add a search result. Results are returned in insertion order, which
    /// callers treat as newest first.
    #[must_use]
    pub fn with_search_hit(self, author: &str, timestamp: DateTime<Utc>, text: &str) -> Self {
        self.lock().search.push(SearchHit {
            author: author.to_string(),
            timestamp,
            text: text.to_string(),
        });
        self
    }

    /// Make `channel_members` fail.
    pub fn fail_members(&self, fail: bool) {
        self.lock().fail_members = fail;
    }

    /// Make `me` fail, as if the account could not be read after connecting.
    pub fn fail_me(&self, fail: bool) {
        self.lock().fail_me = fail;
    }

    /// Messages the gateway relayed.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    /// Number of calls of a backend method by name.
    pub fn calls(&self, method: &str) -> usize {
        self.lock().calls.get(method).copied().unwrap_or_default()
    }

    /// Whether a backend session is up.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Deliver an event to the logged-in session.
    ///
    /// Dropped when nobody is logged in.
    pub async fn emit(&self, event: BackendEvent) {
        let Some(events) = self.lock().events.clone() else {
            debug!(event = event.name(), "no session, dropping event");
            return;
        };
        if events.send(event).await.is_err() {
            debug!("session gone, dropping event");
        }
    }

    /// Let the dispatcher drain its queue.
    ///
    /// Meant for current-thread runtimes, where the in-memory backend never
    /// suspends and each yield lets the dispatcher run to its next `recv`.
    pub async fn settle(&self) {
        for _ in 0..SETTLE_ROUNDS {
            tokio::task::yield_now().await;
        }
    }
}

/// A logged-in account on a [`MemoryWorld`].
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    world: MemoryWorld,
}

impl MemoryBackend {
    fn state(&self, call: &'static str) -> MutexGuard<'_, State> {
        let mut state = self.world.lock();
        state.count(call);
        state
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn protocol(&self) -> &str {
        PROTOCOL
    }

    fn is_connected(&self) -> bool {
        self.world.is_connected()
    }

    async fn me(&self) -> Result<UserInfo, BackendError> {
        let state = self.state("me");
        if state.fail_me {
            return Err(BackendError::Call("account unavailable".into()));
        }
        Ok(state.me.clone().as_me())
    }

    async fn logout(&self) -> Result<(), BackendError> {
        let events = {
            let mut state = self.state("logout");
            state.connected = false;
            state.events.take()
        };
        if let Some(events) = events {
            let _ = events.send(BackendEvent::Logout).await;
        }
        Ok(())
    }

    async fn channels(&self) -> Result<Vec<ChannelInfo>, BackendError> {
        Ok(self.state("channels").groups.iter().map(|group| group.info.clone()).collect())
    }

    async fn channel(&self, id: &ChannelId) -> Result<ChannelInfo, BackendError> {
        self.state("channel").group(id).map(|group| group.info.clone())
    }

    async fn channel_members(&self, id: &ChannelId) -> Result<Vec<UserInfo>, BackendError> {
        let state = self.state("channel_members");
        if state.fail_members {
            return Err(BackendError::Call("members unavailable".into()));
        }
        let group = state.group(id)?;
        Ok(group.members.iter().filter_map(|member| state.user(member)).collect())
    }

    async fn topic(&self, id: &ChannelId) -> Result<String, BackendError> {
        self.state("topic").group(id).map(|group| group.display_name.clone())
    }

    async fn set_topic(&self, id: &ChannelId, text: &str) -> Result<(), BackendError> {
        let mut state = self.state("set_topic");
        let group = state
            .groups
            .iter_mut()
            .find(|group| group.info.id == *id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        group.display_name = text.to_string();
        Ok(())
    }

    async fn users(&self) -> Result<Vec<UserInfo>, BackendError> {
        Ok(self.state("users").users.clone())
    }

    async fn user(&self, id: &UserId) -> Result<UserInfo, BackendError> {
        self.state("user").user(id).ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn send_message(
        &self,
        target: &MessageTarget,
        _parent: Option<&MessageId>,
        text: &str,
    ) -> Result<MessageId, BackendError> {
        let mut state = self.state("send_message");
        if let MessageTarget::Channel(id) = target {
            state.group(id)?;
        }
        state.sent.push(SentMessage { target: target.clone(), text: text.to_string() });
        Ok(MessageId::new(format!("sent-{}", state.sent.len())))
    }

    async fn presence(&self, id: &UserId) -> Result<String, BackendError> {
        let state = self.state("presence");
        Ok(state.presence.get(id).cloned().unwrap_or_else(|| "online".to_string()))
    }

    async fn leave_channel(&self, id: &ChannelId) -> Result<(), BackendError> {
        let mut state = self.state("leave_channel");
        state.group(id)?;
        state.groups.retain(|group| group.info.id != *id);
        Ok(())
    }

    async fn set_nick(&self, name: &str) -> Result<(), BackendError> {
        self.state("set_nick").me.nick = name.to_string();
        Ok(())
    }

    fn channel_id_for(&self, reference: &str, _team_id: &str) -> ChannelId {
        if let Some((_, id)) = reference.rsplit_once('|') {
            return ChannelId::new(id);
        }
        let state = self.world.lock();
        state
            .groups
            .iter()
            .find(|group| group.display_name.eq_ignore_ascii_case(reference))
            .map_or_else(|| ChannelId::new(reference), |group| group.info.id.clone())
    }

    async fn direct_channel_id(
        &self,
        user: &UserId,
        _team_id: &str,
    ) -> Result<ChannelId, BackendError> {
        let state = self.state("direct_channel_id");
        let direct = state
            .groups
            .iter()
            .find(|group| group.info.direct && group.members.contains(user))
            .map(|group| group.info.id.clone());
        Ok(direct.unwrap_or_else(|| ChannelId::new(format!("dm-{user}"))))
    }

    async fn history(
        &self,
        channel: &ChannelId,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, BackendError> {
        let state = self.state("history");
        let messages = state.history.get(channel).map(Vec::as_slice).unwrap_or_default();
        Ok(messages[messages.len().saturating_sub(limit)..].to_vec())
    }

    async fn search_messages(&self, _query: &str) -> Result<Vec<SearchHit>, BackendError> {
        Ok(self.state("search_messages").search.clone())
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserInfo>, BackendError> {
        let state = self.state("search_users");
        if query.is_empty() {
            return Err(BackendError::InvalidReference("empty query".into()));
        }
        Ok(state.users.iter().filter(|user| user.nick.contains(query)).cloned().collect())
    }

    async fn update_channels(&self) -> Result<(), BackendError> {
        self.state("update_channels");
        Ok(())
    }
}

/// Logs in to a [`MemoryWorld`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    world: MemoryWorld,
    password: Option<String>,
}

impl MemoryConnector {
    /// Connector accepting any credentials.
    pub fn new(world: MemoryWorld) -> Self {
        Self { world, password: None }
    }

    /// Require `password` on login.
    #[must_use]
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn protocol(&self) -> &str {
        PROTOCOL
    }

    async fn connect(
        &self,
        credentials: Credentials,
        events: EventSender,
    ) -> Result<Arc<dyn Backend>, BackendError> {
        if let Some(password) = &self.password {
            if credentials.login.is_empty() {
                return Err(BackendError::Authentication("need LOGIN <email> <pass>".into()));
            }
            if credentials.password != *password {
                return Err(BackendError::Authentication("login failed: wrong password".into()));
            }
        }

        let mut state = self.world.lock();
        state.count("connect");
        state.events = Some(events);
        state.connected = true;
        Ok(Arc::new(MemoryBackend { world: self.world.clone() }))
    }
}
