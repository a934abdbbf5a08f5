//! Channel membership synchronization.
//!
//! Mirrors a backend group's member list into the registry, joins the
//! principal when the access policy allows, and publishes the topic.
//! Syncing the same channel again is a no-op apart from picking up new
//! members.

use ghostgate_core::{Backend, ChannelId, naming::USERS_CHANNEL};
use tracing::{debug, warn};

use crate::{
    context::SessionContext,
    message::Outbound,
    registry::{ChannelKey, Member},
};

/// Synchronizes backend groups into protocol channels for one principal.
#[derive(Clone)]
pub struct ChannelSynchronizer {
    ctx: SessionContext,
}

impl ChannelSynchronizer {
    /// Create a synchronizer for a session.
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    /// Sync one backend group.
    ///
    /// Backend failures are logged and abort the sync.
    pub async fn sync(&self, backend: &dyn Backend, channel_id: &ChannelId, name: &str) {
        let members = match backend.channel_members(channel_id).await {
            Ok(members) => members,
            Err(err) => {
                warn!(channel = %channel_id, error = %err, "failed to fetch channel members");
                return;
            },
        };

        let registry = &self.ctx.registry;
        let ghosts: Vec<Member> = members
            .iter()
            .filter(|info| !info.me)
            .map(|info| registry.get_or_create_ghost(info).member())
            .collect();

        self.join_members(&ChannelKey::users(), USERS_CHANNEL, &ghosts);

        let key = ChannelKey::backend(channel_id);
        let channel = registry.ensure_channel(&key, name);
        self.join_members(&key, &channel.name, &ghosts);

        let principal = &self.ctx.principal;
        if registry.is_member(&key, &principal.member()) {
            return;
        }
        if !self.ctx.settings.policy.may_join(&channel.name) {
            debug!(channel = %channel.name, "policy denies join");
            return;
        }

        debug!(channel = %channel.name, id = %channel_id, "joining principal");
        if !self.join_principal(&key, &channel.name) {
            return;
        }

        let topic = match backend.topic(channel_id).await {
            Ok(topic) => topic,
            Err(err) => {
                warn!(channel = %channel_id, error = %err, "failed to fetch topic");
                return;
            },
        };
        registry.set_topic(&key, &topic);
        principal.send(Outbound::Topic {
            setter: self.ctx.login_service.clone(),
            channel: channel.name,
            topic,
        });
    }

    /// Batch-join members and announce the new ones if the principal is in
    /// the channel.
    pub fn join_members(&self, key: &ChannelKey, name: &str, members: &[Member]) {
        let registry = &self.ctx.registry;
        let joined = registry.batch_join(key, members);
        if joined.is_empty() || !registry.is_member(key, &self.ctx.principal.member()) {
            return;
        }

        let ghosts = joined.iter().filter_map(|member| match member {
            Member::Ghost(id) => registry.ghost(id),
            Member::Principal(_) => None,
        });
        for ghost in ghosts {
            self.ctx.principal.send(Outbound::Join { who: ghost.prefix(), channel: name.to_string() });
        }
    }

    /// Join the principal to a channel and send the member list.
    ///
    /// Does nothing once the principal has logged out. Returns whether the
    /// principal joined.
    pub fn join_principal(&self, key: &ChannelKey, name: &str) -> bool {
        let principal = &self.ctx.principal;
        if !principal.is_logged_in() {
            debug!(channel = name, "principal logged out, not joining");
            return false;
        }
        if !self.ctx.registry.join(key, &principal.member()) {
            return false;
        }
        principal.send(Outbound::Join { who: principal.prefix(), channel: name.to_string() });
        principal.send(Outbound::Names {
            nick: principal.nick(),
            channel: name.to_string(),
            names: self.ctx.registry.member_nicks(key),
        });
        true
    }
}
