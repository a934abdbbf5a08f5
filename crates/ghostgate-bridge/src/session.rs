//! One client connection: login, logout and client-originated messages.

#![allow(clippy::disallowed_types, reason = "Synchronous critical sections only")]

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use ghostgate_core::{Connector, Credentials, MessageTarget, Presence};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time,
};
use tracing::{debug, info, warn};

use crate::{
    context::SessionContext,
    dispatcher::{DispatchState, EventDispatcher},
    error::GatewayError,
    message::{Numeric, Outbound},
    registry::ChannelKey,
    service::ServiceCommandRouter,
};

/// How long logout waits for the dispatcher to drain queued events.
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A client connection and, once logged in, its backend session.
pub struct Session {
    ctx: SessionContext,
    connector: Arc<dyn Connector>,
    state: Arc<watch::Sender<DispatchState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub(crate) fn new(ctx: SessionContext, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(DispatchState::Unauthenticated);
        Self { ctx, connector, state: Arc::new(state), task: Mutex::new(None) }
    }

    /// Shared session state.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Current dispatcher state.
    pub fn state(&self) -> DispatchState {
        *self.state.borrow()
    }

    /// Watch dispatcher state changes.
    pub fn subscribe(&self) -> watch::Receiver<DispatchState> {
        self.state.subscribe()
    }

    /// Wait until the dispatcher reaches `target`.
    pub async fn wait_for(&self, target: DispatchState) {
        let mut rx = self.subscribe();
        // Sender lives as long as self, so this only ends on reaching target
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Log in to the backend and start the dispatcher.
    ///
    /// # Errors
    ///
    /// - `Busy` if another login or logout is in flight
    /// - `Authentication` if already logged in, the server is not allowed
    ///   or the backend rejects the credentials
    /// - `Invariant` if the dispatcher exited before the handover
    pub async fn login(&self, credentials: Credentials) -> Result<(), GatewayError> {
        let principal = &self.ctx.principal;
        let _guard = principal.try_begin().ok_or(GatewayError::Busy)?;

        if principal.is_logged_in() {
            return Err(GatewayError::Authentication("already logged in".into()));
        }
        let restriction = &self.ctx.settings.restriction;
        if let Some(server) = credentials.server().filter(|server| !restriction.permits(server)) {
            return Err(GatewayError::Authentication(format!("{server} is not allowed")));
        }

        let (events_tx, events_rx) = mpsc::channel(self.ctx.queue_capacity.max(1));
        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(EventDispatcher::run(
            self.ctx.clone(),
            ready_rx,
            events_rx,
            Arc::clone(&self.state),
        ));
        if let Some(previous) = self.replace_task(Some(handle)) {
            previous.abort();
        }

        debug!(session = principal.session_id(), login = %credentials.login, "connecting");
        let backend = self
            .connector
            .connect(credentials, events_tx)
            .await
            .map_err(|err| GatewayError::Authentication(err.to_string()))?;
        let me = match backend.me().await {
            Ok(me) => me,
            Err(err) => {
                if let Err(logout_err) = backend.logout().await {
                    warn!(error = %logout_err, "backend logout after failed login failed");
                }
                return Err(GatewayError::Authentication(err.to_string()));
            },
        };

        principal.bind(me.clone(), Arc::clone(&backend));

        match backend.presence(&me.id).await {
            Ok(status) if Presence::parse(&status) == Presence::Away => {
                if principal.set_away(true) {
                    principal.send(Outbound::Reply {
                        numeric: Numeric::NowAway,
                        nick: principal.nick(),
                    });
                }
            },
            Ok(_) => {},
            Err(err) => debug!(error = %err, "presence unavailable"),
        }

        if ready_tx.send(backend).is_err() {
            principal.unbind();
            return Err(GatewayError::Invariant("dispatcher exited before login completed".into()));
        }

        info!(session = principal.session_id(), nick = %me.nick, "logged in");
        Ok(())
    }

    /// Log out of the backend and part every channel.
    ///
    /// Events the backend queued before its logout are still delivered; the
    /// principal leaves its channels once the dispatcher has drained them.
    ///
    /// # Errors
    ///
    /// - `Busy` if another login or logout is in flight
    /// - `NotLoggedIn` without a bound backend
    pub async fn logout(&self) -> Result<(), GatewayError> {
        let principal = &self.ctx.principal;
        let _guard = principal.try_begin().ok_or(GatewayError::Busy)?;
        let backend = principal.backend().ok_or(GatewayError::NotLoggedIn)?;

        if let Err(err) = backend.logout().await {
            warn!(error = %err, "backend logout failed");
        }

        if let Some(mut task) = self.replace_task(None) {
            let drained = time::timeout(DISPATCHER_DRAIN_TIMEOUT, &mut task).await;
            if drained.is_err() {
                warn!(session = principal.session_id(), "dispatcher did not stop, aborting");
                task.abort();
            }
        }
        self.ctx.end_session();

        info!(session = principal.session_id(), "logged out");
        Ok(())
    }

    /// Handle a PRIVMSG from the client.
    ///
    /// Service accounts get the line as a command. Channel and ghost targets
    /// are relayed to the backend.
    ///
    /// # Errors
    ///
    /// - `NotLoggedIn` when relaying without a bound backend
    /// - `Reference` if the target is unknown or not backed by the backend
    /// - `Backend` if sending fails
    pub async fn handle_privmsg(&self, target: &str, text: &str) -> Result<(), GatewayError> {
        if self.ctx.is_service(target) {
            let service = if target.eq_ignore_ascii_case(&self.ctx.login_service.nick) {
                &self.ctx.login_service
            } else {
                &self.ctx.system_service
            };
            ServiceCommandRouter::new(self, service).dispatch(text).await;
            return Ok(());
        }

        let backend = self.ctx.principal.backend().ok_or(GatewayError::NotLoggedIn)?;
        let destination = if target.starts_with(['#', '&']) {
            let channel = self
                .ctx
                .registry
                .channel_by_name(target)
                .ok_or_else(|| GatewayError::Reference(target.to_string()))?;
            match channel.key {
                ChannelKey::Backend(id) => MessageTarget::Channel(id),
                ChannelKey::Synthetic(_) => {
                    return Err(GatewayError::Reference(target.to_string()));
                },
            }
        } else {
            let ghost = self
                .ctx
                .registry
                .ghost_by_nick(target)
                .ok_or_else(|| GatewayError::Reference(target.to_string()))?;
            MessageTarget::User(ghost.id().clone())
        };

        backend.send_message(&destination, None, text).await?;
        Ok(())
    }

    /// Client disconnected. Stops the dispatcher and logs the backend out.
    pub async fn close(&self) {
        if let Some(task) = self.replace_task(None) {
            task.abort();
        }
        let principal = &self.ctx.principal;
        self.ctx.registry.remove_principal(principal.session_id());

        let Some(backend) = principal.unbind() else {
            debug!(session = principal.session_id(), "session closed");
            return;
        };
        if let Err(err) = backend.logout().await {
            warn!(error = %err, "backend logout on disconnect failed");
        }
        debug!(session = principal.session_id(), "session closed, backend logged out");
    }

    fn replace_task(&self, task: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
        let mut slot = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, task)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("principal", &self.ctx.principal)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
