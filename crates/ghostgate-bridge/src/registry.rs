//! Shared registry of ghosts, principals and channel membership.
//!
//! The registry maintains bidirectional mappings: channel → members (for
//! NAMES and membership checks) and member → channels (for cleanup on
//! logout). Ghosts are indexed by backend user id and by nick.
//!
//! One registry is shared by every session of a gateway. All state sits
//! behind a single mutex that is never held across an `.await`; each method
//! is one short critical section.
//!
//! # Invariants
//!
//! - At most one ghost per backend user id for the registry's lifetime.
//! - A member appears in a channel's member set iff the channel appears in
//!   the member's channel set.

#![allow(clippy::disallowed_types, reason = "Synchronous critical sections only")]

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use ghostgate_core::{
    ChannelId, UserId, UserInfo,
    naming::{MESSAGES_CHANNEL, USERS_CHANNEL, sanitize_nick},
};

use crate::message::Prefix;

/// Something that can be a channel member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Member {
    /// A backend user's ghost.
    Ghost(UserId),
    /// A connected principal, by session id.
    Principal(u64),
}

/// Registry key of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    /// Channel mirroring a backend group.
    Backend(ChannelId),
    /// Gateway-local channel such as `&users`.
    Synthetic(&'static str),
}

impl ChannelKey {
    /// The `&users` channel.
    pub fn users() -> Self {
        Self::Synthetic(USERS_CHANNEL)
    }

    /// The `&messages` channel.
    pub fn messages() -> Self {
        Self::Synthetic(MESSAGES_CHANNEL)
    }

    /// Key for a backend group.
    pub fn backend(id: &ChannelId) -> Self {
        Self::Backend(id.clone())
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(id) => write!(f, "{id}"),
            Self::Synthetic(name) => f.write_str(name),
        }
    }
}

/// Protocol identity of a backend user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ghost {
    /// Sanitized protocol nick.
    pub nick: String,
    /// Latest backend profile.
    pub info: UserInfo,
}

impl Ghost {
    /// Backend user id.
    pub fn id(&self) -> &UserId {
        &self.info.id
    }

    /// Message prefix.
    pub fn prefix(&self) -> Prefix {
        Prefix::new(self.nick.clone(), self.info.host.clone())
    }

    /// Channel member handle.
    pub fn member(&self) -> Member {
        Member::Ghost(self.info.id.clone())
    }
}

/// Nick change reported by [`Registry::update_ghost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    /// Identity before the change.
    pub old_prefix: Prefix,
    /// New nick.
    pub new_nick: String,
}

/// Result of [`Registry::update_ghost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostUpdate {
    /// The ghost after the update.
    pub ghost: Ghost,
    /// Present iff the nick changed.
    pub renamed: Option<Rename>,
}

/// Snapshot of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Registry key.
    pub key: ChannelKey,
    /// Protocol name.
    pub name: String,
    /// Current topic.
    pub topic: String,
}

#[derive(Debug)]
struct ChannelEntry {
    name: String,
    topic: String,
    members: HashSet<Member>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Backend user id → ghost
    ghosts: HashMap<UserId, Ghost>,
    /// Ghost nick → backend user id
    ghost_nicks: HashMap<String, UserId>,
    /// Session id → principal nick
    principals: HashMap<u64, String>,
    /// Channel key → channel
    channels: HashMap<ChannelKey, ChannelEntry>,
    /// Lowercased protocol name → channel key
    channel_names: HashMap<String, ChannelKey>,
    /// Member → channels it is in
    memberships: HashMap<Member, HashSet<ChannelKey>>,
}

impl Inner {
    fn nick_of(&self, member: &Member) -> Option<String> {
        match member {
            Member::Ghost(id) => self.ghosts.get(id).map(|ghost| ghost.nick.clone()),
            Member::Principal(session) => self.principals.get(session).cloned(),
        }
    }

    fn ensure_channel(&mut self, key: &ChannelKey, name: &str) -> &mut ChannelEntry {
        let names = &mut self.channel_names;
        self.channels.entry(key.clone()).or_insert_with(|| {
            let name = match key {
                ChannelKey::Synthetic(synthetic) => (*synthetic).to_string(),
                ChannelKey::Backend(_) => name.to_string(),
            };
            names.insert(name.to_lowercase(), key.clone());
            ChannelEntry { name, topic: String::new(), members: HashSet::new() }
        })
    }

    fn join(&mut self, key: &ChannelKey, member: &Member) -> bool {
        let name = key.to_string();
        let joined = self.ensure_channel(key, &name).members.insert(member.clone());
        if joined {
            self.memberships.entry(member.clone()).or_default().insert(key.clone());
        }
        joined
    }

    fn part(&mut self, key: &ChannelKey, member: &Member) -> bool {
        let removed = self.channels.get_mut(key).is_some_and(|ch| ch.members.remove(member));
        if let Some(channels) = self.memberships.get_mut(member) {
            channels.remove(key);
            if channels.is_empty() {
                self.memberships.remove(member);
            }
        }
        removed
    }

    fn insert_ghost(&mut self, info: &UserInfo) -> Ghost {
        let ghost = Ghost { nick: sanitize_nick(&info.nick), info: info.clone() };
        self.ghost_nicks.insert(ghost.nick.clone(), info.id.clone());
        self.ghosts.insert(info.id.clone(), ghost.clone());
        ghost
    }
}

/// Thread-safe shared registry. Cloning yields another handle to the same
/// state.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Inner>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a principal under its session id.
    pub fn add_principal(&self, session_id: u64, nick: &str) {
        self.lock().principals.insert(session_id, nick.to_string());
    }

    /// Change a principal's nick.
    pub fn rename_principal(&self, session_id: u64, nick: &str) {
        if let Some(current) = self.lock().principals.get_mut(&session_id) {
            *current = nick.to_string();
        }
    }

    /// Remove a principal from every channel. Returns the channels it was in.
    pub fn part_all(&self, session_id: u64) -> Vec<Channel> {
        let mut inner = self.lock();
        let member = Member::Principal(session_id);
        let keys: Vec<ChannelKey> =
            inner.memberships.get(&member).map(|keys| keys.iter().cloned().collect()).unwrap_or_default();

        let mut parted = Vec::with_capacity(keys.len());
        for key in keys {
            inner.part(&key, &member);
            if let Some(entry) = inner.channels.get(&key) {
                parted.push(Channel { key, name: entry.name.clone(), topic: entry.topic.clone() });
            }
        }
        parted
    }

    /// Unregister a principal and remove all its memberships.
    pub fn remove_principal(&self, session_id: u64) -> Vec<Channel> {
        let parted = self.part_all(session_id);
        self.lock().principals.remove(&session_id);
        parted
    }

    /// Ghost of a backend user.
    pub fn ghost(&self, id: &UserId) -> Option<Ghost> {
        self.lock().ghosts.get(id).cloned()
    }

    /// Ghost currently using `nick`.
    pub fn ghost_by_nick(&self, nick: &str) -> Option<Ghost> {
        let inner = self.lock();
        inner.ghost_nicks.get(nick).and_then(|id| inner.ghosts.get(id)).cloned()
    }

    /// Existing ghost for `info.id`, unchanged, or a new one with a
    /// sanitized nick.
    pub fn get_or_create_ghost(&self, info: &UserInfo) -> Ghost {
        let mut inner = self.lock();
        if let Some(ghost) = inner.ghosts.get(&info.id) {
            return ghost.clone();
        }
        inner.insert_ghost(info)
    }

    /// Create or refresh a ghost from a new profile.
    ///
    /// Reports a rename when the sanitized nick differs from the stored one.
    pub fn update_ghost(&self, info: &UserInfo) -> GhostUpdate {
        let mut inner = self.lock();
        let Some(existing) = inner.ghosts.get(&info.id).cloned() else {
            return GhostUpdate { ghost: inner.insert_ghost(info), renamed: None };
        };

        let new_nick = sanitize_nick(&info.nick);
        let renamed = (existing.nick != new_nick)
            .then(|| Rename { old_prefix: existing.prefix(), new_nick: new_nick.clone() });

        if renamed.is_some() && inner.ghost_nicks.get(&existing.nick) == Some(&info.id) {
            inner.ghost_nicks.remove(&existing.nick);
        }
        GhostUpdate { ghost: inner.insert_ghost(info), renamed }
    }

    /// Create a channel if it does not exist yet. An existing channel keeps
    /// its name.
    pub fn ensure_channel(&self, key: &ChannelKey, name: &str) -> Channel {
        let mut inner = self.lock();
        let entry = inner.ensure_channel(key, name);
        Channel { key: key.clone(), name: entry.name.clone(), topic: entry.topic.clone() }
    }

    /// Channel snapshot.
    pub fn channel(&self, key: &ChannelKey) -> Option<Channel> {
        self.lock().channels.get(key).map(|entry| Channel {
            key: key.clone(),
            name: entry.name.clone(),
            topic: entry.topic.clone(),
        })
    }

    /// Channel with protocol name `name` (case-insensitive).
    pub fn channel_by_name(&self, name: &str) -> Option<Channel> {
        let key = self.lock().channel_names.get(&name.to_lowercase()).cloned()?;
        self.channel(&key)
    }

    /// Add a member. Returns true if it was not a member before.
    pub fn join(&self, key: &ChannelKey, member: &Member) -> bool {
        self.lock().join(key, member)
    }

    /// Add several members at once. Returns those that were newly added.
    pub fn batch_join(&self, key: &ChannelKey, members: &[Member]) -> Vec<Member> {
        let mut inner = self.lock();
        members.iter().filter(|member| inner.join(key, member)).cloned().collect()
    }

    /// Remove a member. Returns true if it was a member.
    pub fn part(&self, key: &ChannelKey, member: &Member) -> bool {
        self.lock().part(key, member)
    }

    /// Whether `member` is in the channel.
    pub fn is_member(&self, key: &ChannelKey, member: &Member) -> bool {
        self.lock().channels.get(key).is_some_and(|entry| entry.members.contains(member))
    }

    /// Sorted nicks of every member.
    pub fn member_nicks(&self, key: &ChannelKey) -> Vec<String> {
        let inner = self.lock();
        let mut nicks: Vec<String> = inner
            .channels
            .get(key)
            .into_iter()
            .flat_map(|entry| entry.members.iter())
            .filter_map(|member| inner.nick_of(member))
            .collect();
        nicks.sort();
        nicks
    }

    /// Number of members.
    pub fn member_count(&self, key: &ChannelKey) -> usize {
        self.lock().channels.get(key).map_or(0, |entry| entry.members.len())
    }

    /// Set a channel's topic.
    pub fn set_topic(&self, key: &ChannelKey, topic: &str) {
        if let Some(entry) = self.lock().channels.get_mut(key) {
            entry.topic = topic.to_string();
        }
    }

    /// Every channel `member` is in.
    pub fn channels_for(&self, member: &Member) -> Vec<ChannelKey> {
        self.lock().memberships.get(member).map(|keys| keys.iter().cloned().collect()).unwrap_or_default()
    }

    /// Number of ghosts.
    pub fn ghost_count(&self) -> usize {
        self.lock().ghosts.len()
    }
}
