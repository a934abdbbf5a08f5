//! One gateway, one client, one in-memory backend.

use std::sync::Arc;

use ghostgate_bridge::{DispatchState, Gateway, GatewayError, Outbound, Session};
use ghostgate_core::{BackendEvent, ConfigError, Credentials, GatewayConfig, Highlighter};
use tokio::sync::mpsc;

use crate::memory::{MemoryConnector, MemoryWorld};

/// Nick the fixture client connects with.
pub const CLIENT_NICK: &str = "guest";

/// A gateway wired to a [`MemoryWorld`] with a single connected client.
pub struct Fixture {
    /// The fake backend.
    pub world: MemoryWorld,
    /// The gateway under test.
    pub gateway: Gateway,
    /// The client's session.
    pub session: Arc<Session>,
    outbox: mpsc::UnboundedReceiver<Outbound>,
}

impl Fixture {
    /// Fixture with default configuration.
    ///
    /// # Errors
    ///
    /// Never in practice; the default configuration always compiles.
    pub fn new(world: MemoryWorld) -> Result<Self, ConfigError> {
        Self::with_config(world, "")
    }

    /// Fixture with a TOML configuration.
    ///
    /// # Errors
    ///
    /// If the configuration does not parse or a pattern does not compile.
    pub fn with_config(world: MemoryWorld, config: &str) -> Result<Self, ConfigError> {
        Self::build(world, MemoryConnector::new, config, None)
    }

    /// Fixture with full control over the connector and highlighter.
    ///
    /// # Errors
    ///
    /// If the configuration does not parse or a pattern does not compile.
    pub fn build(
        world: MemoryWorld,
        connector: impl FnOnce(MemoryWorld) -> MemoryConnector,
        config: &str,
        highlighter: Option<Arc<dyn Highlighter>>,
    ) -> Result<Self, ConfigError> {
        let config = GatewayConfig::parse(config)?;
        let gateway = Gateway::new(config, Arc::new(connector(world.clone())), highlighter)?;
        let (session, outbox) = gateway.open_session(CLIENT_NICK);
        Ok(Self { world, gateway, session, outbox })
    }

    /// Log in and wait for the bootstrap to finish.
    ///
    /// # Errors
    ///
    /// Whatever the login returns.
    pub async fn login(&self, login: &str, password: &str) -> Result<(), GatewayError> {
        self.session.login(Credentials::new(login, password)).await?;
        self.session.wait_for(DispatchState::Live).await;
        Ok(())
    }

    /// Send a line to a service account and return the replies.
    pub async fn command(&mut self, service: &str, line: &str) -> Vec<String> {
        // Service commands never fail at the session level
        let _ = self.session.handle_privmsg(service, line).await;
        self.world.settle().await;
        self.texts()
    }

    /// Emit an event and wait for the dispatcher to handle it.
    pub async fn emit(&mut self, event: BackendEvent) -> Vec<Outbound> {
        self.world.emit(event).await;
        self.world.settle().await;
        self.drain()
    }

    /// Everything sent to the client since the last drain.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut messages = Vec::new();
        while let Ok(message) = self.outbox.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Rendered protocol lines since the last drain.
    pub fn lines(&mut self) -> Vec<String> {
        self.drain().iter().map(ToString::to_string).collect()
    }

    /// Message texts since the last drain.
    pub fn texts(&mut self) -> Vec<String> {
        self.drain().iter().filter_map(|message| message.text().map(str::to_string)).collect()
    }
}
