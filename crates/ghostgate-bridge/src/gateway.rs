//! Gateway: owns the registry and opens sessions for new clients.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use ghostgate_core::{ConfigError, Connector, GatewayConfig, Highlighter, Settings};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    context::SessionContext, message::Outbound, message::Prefix, principal::Principal,
    registry::Registry, session::Session,
};

/// Entry point for protocol clients of one backend protocol.
pub struct Gateway {
    config: GatewayConfig,
    settings: Arc<Settings>,
    connector: Arc<dyn Connector>,
    highlighter: Option<Arc<dyn Highlighter>>,
    registry: Registry,
    next_session: AtomicU64,
}

impl Gateway {
    /// Build a gateway from configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Pattern`] if the protocol's join patterns don't compile.
    pub fn new(
        config: GatewayConfig,
        connector: Arc<dyn Connector>,
        highlighter: Option<Arc<dyn Highlighter>>,
    ) -> Result<Self, ConfigError> {
        let settings = Settings::from_config(&config.bridge(connector.protocol()))?;
        info!(protocol = connector.protocol(), service = %config.gateway.service_nick, "gateway ready");

        Ok(Self {
            config,
            settings: Arc::new(settings),
            connector,
            highlighter,
            registry: Registry::new(),
            next_session: AtomicU64::new(1),
        })
    }

    /// Accept a client under `nick`.
    ///
    /// Returns the session and the stream of messages to write to the client.
    pub fn open_session(&self, nick: &str) -> (Arc<Session>, mpsc::UnboundedReceiver<Outbound>) {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (outbox, rx) = mpsc::unbounded_channel();

        self.registry.add_principal(session_id, nick);
        let ctx = SessionContext {
            registry: self.registry.clone(),
            principal: Arc::new(Principal::new(session_id, nick, outbox)),
            settings: Arc::clone(&self.settings),
            highlighter: self.highlighter.clone(),
            login_service: Prefix::new(self.connector.protocol(), ""),
            system_service: Prefix::new(self.config.gateway.service_nick.as_str(), ""),
            queue_capacity: self.config.gateway.queue_capacity,
        };

        debug!(session = session_id, nick, "session opened");
        (Arc::new(Session::new(ctx, Arc::clone(&self.connector))), rx)
    }

    /// The shared registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Compiled settings of the gateway's protocol.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
