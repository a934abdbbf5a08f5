//! State shared by the components of one session.

use std::sync::Arc;

use ghostgate_core::{Backend, Highlighter, Settings};

use crate::{
    message::{Outbound, Prefix},
    principal::Principal,
    registry::Registry,
};

/// Handles every session component needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Gateway-wide registry.
    pub registry: Registry,
    /// The session's principal.
    pub principal: Arc<Principal>,
    /// Compiled settings of the backend protocol.
    pub settings: Arc<Settings>,
    /// Syntax highlighter for code fences.
    pub highlighter: Option<Arc<dyn Highlighter>>,
    /// Login service account (nick = backend protocol name).
    pub login_service: Prefix,
    /// System service account.
    pub system_service: Prefix,
    /// Capacity of the backend event queue.
    pub queue_capacity: usize,
}

impl SessionContext {
    /// Whether `nick` names one of the service accounts.
    pub fn is_service(&self, nick: &str) -> bool {
        nick.eq_ignore_ascii_case(&self.login_service.nick)
            || nick.eq_ignore_ascii_case(&self.system_service.nick)
    }

    /// Part the principal from every channel and drop its backend binding.
    ///
    /// Returns the backend that was bound, if any. Calling it again once the
    /// principal is unbound sends nothing.
    pub fn end_session(&self) -> Option<Arc<dyn Backend>> {
        let principal = &self.principal;
        let prefix = principal.prefix();
        for channel in self.registry.part_all(principal.session_id()) {
            principal.send(Outbound::Part { who: prefix.clone(), channel: channel.name });
        }
        principal.unbind()
    }
}
