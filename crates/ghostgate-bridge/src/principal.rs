//! The protocol identity behind one client connection.
//!
//! A principal owns its nick, the backend account it is bound to after
//! login, a login/logout guard, its thread tag state and the sink for
//! outbound messages. Every field is independently synchronized; no lock is
//! held across an `.await`.

#![allow(clippy::disallowed_types, reason = "Synchronous critical sections only")]

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock,
    atomic::{AtomicBool, Ordering},
};

use ghostgate_core::{Backend, ThreadContext, UserInfo};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{message::Prefix, registry::Member};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the login/logout guard; releases it on drop.
#[derive(Debug)]
pub struct LoginGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// One connected protocol user.
pub struct Principal {
    session_id: u64,
    nick: Mutex<String>,
    me: Mutex<Option<UserInfo>>,
    backend: RwLock<Option<Arc<dyn Backend>>>,
    in_progress: AtomicBool,
    away: AtomicBool,
    threads: Mutex<ThreadContext>,
    outbox: mpsc::UnboundedSender<crate::Outbound>,
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("session_id", &self.session_id)
            .field("nick", &self.nick())
            .field("logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}

impl Principal {
    /// Create a principal writing to `outbox`.
    pub fn new(
        session_id: u64,
        nick: impl Into<String>,
        outbox: mpsc::UnboundedSender<crate::Outbound>,
    ) -> Self {
        Self {
            session_id,
            nick: Mutex::new(nick.into()),
            me: Mutex::new(None),
            backend: RwLock::new(None),
            in_progress: AtomicBool::new(false),
            away: AtomicBool::new(false),
            threads: Mutex::new(ThreadContext::new()),
            outbox,
        }
    }

    /// Session id.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Channel member handle.
    pub fn member(&self) -> Member {
        Member::Principal(self.session_id)
    }

    /// Current nick.
    pub fn nick(&self) -> String {
        lock(&self.nick).clone()
    }

    /// Change the nick. Returns the prefix before the change.
    pub fn set_nick(&self, nick: &str) -> Prefix {
        let mut current = lock(&self.nick);
        let old = Prefix::new(current.clone(), "");
        *current = nick.to_string();
        old
    }

    /// Message prefix.
    pub fn prefix(&self) -> Prefix {
        let host = lock(&self.me).as_ref().map(|me| me.host.clone()).unwrap_or_default();
        Prefix::new(self.nick(), host)
    }

    /// The bound backend account.
    pub fn me(&self) -> Option<UserInfo> {
        lock(&self.me).clone()
    }

    /// The bound backend.
    pub fn backend(&self) -> Option<Arc<dyn Backend>> {
        self.backend.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether a backend is bound.
    pub fn is_logged_in(&self) -> bool {
        self.backend.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Whether `backend` is the one currently bound.
    pub fn is_bound_to(&self, backend: &Arc<dyn Backend>) -> bool {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(bound, backend))
    }

    /// Bind to a logged-in backend account.
    pub fn bind(&self, me: UserInfo, backend: Arc<dyn Backend>) {
        *lock(&self.me) = Some(me.as_me());
        *self.backend.write().unwrap_or_else(PoisonError::into_inner) = Some(backend);
    }

    /// Drop the backend binding and every thread tag.
    pub fn unbind(&self) -> Option<Arc<dyn Backend>> {
        lock(&self.me).take();
        lock(&self.threads).clear();
        self.away.store(false, Ordering::Release);
        self.backend.write().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Start a login or logout. `None` while another one is in flight.
    pub fn try_begin(&self) -> Option<LoginGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoginGuard { flag: &self.in_progress })
    }

    /// Whether a login or logout is in flight.
    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Record away state. Returns true if it changed.
    pub fn set_away(&self, away: bool) -> bool {
        self.away.swap(away, Ordering::AcqRel) != away
    }

    /// Whether the principal is marked away.
    pub fn is_away(&self) -> bool {
        self.away.load(Ordering::Acquire)
    }

    /// Run `f` with exclusive access to the thread tag state.
    pub fn with_threads<R>(&self, f: impl FnOnce(&mut ThreadContext) -> R) -> R {
        f(&mut lock(&self.threads))
    }

    /// Queue a message for the client. Dropped silently once the client is
    /// gone.
    pub fn send(&self, message: crate::Outbound) {
        if self.outbox.send(message).is_err() {
            debug!(session = self.session_id, "client gone, dropping outbound message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> (Principal, mpsc::UnboundedReceiver<crate::Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Principal::new(1, "guest", tx), rx)
    }

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let (p, _rx) = principal();

        let guard = p.try_begin();
        assert!(guard.is_some());
        assert!(p.try_begin().is_none());
        assert!(p.in_progress());

        drop(guard);
        assert!(!p.in_progress());
        assert!(p.try_begin().is_some());
    }

    #[test]
    fn away_reports_changes_only() {
        let (p, _rx) = principal();
        assert!(!p.set_away(false));
        assert!(p.set_away(true));
        assert!(!p.set_away(true));
        assert!(p.is_away());
    }

    #[test]
    fn rename_returns_old_prefix() {
        let (p, _rx) = principal();
        let old = p.set_nick("alice");
        assert_eq!(old.nick, "guest");
        assert_eq!(p.nick(), "alice");
    }

    #[test]
    fn send_reaches_outbox() {
        let (p, mut rx) = principal();
        p.send(crate::Outbound::Reply { numeric: crate::Numeric::UnAway, nick: "guest".into() });
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn send_after_client_gone_is_silent() {
        let (p, rx) = principal();
        drop(rx);
        p.send(crate::Outbound::Reply { numeric: crate::Numeric::UnAway, nick: "guest".into() });
    }
}
