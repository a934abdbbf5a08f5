//! Ghostgate bridge.
//!
//! Async engine that maps a chat backend account onto a line-oriented
//! protocol client. Backend users appear as ghosts, backend groups as
//! channels, and two service accounts accept commands.
//!
//! # Architecture
//!
//! The [`Gateway`] owns a [`Registry`] shared by every session. Each client
//! gets a [`Session`]; logging in spawns one [`EventDispatcher`] task that
//! consumes the backend's event queue in order. Everything the client should
//! see is pushed as [`Outbound`] values into the session's outbox; writing
//! them to a socket is the caller's job.
//!
//! # Components
//!
//! - [`Gateway`]: configuration, registry, session ids
//! - [`Session`]: login, logout, relaying client messages
//! - [`ServiceCommandRouter`]: commands sent to the service accounts
//! - [`EventDispatcher`]: backend events to protocol messages
//! - [`ChannelSynchronizer`]: backend group membership to channels

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod context;
mod dispatcher;
mod error;
mod gateway;
mod message;
mod principal;
pub mod registry;
pub mod render;
pub mod service;
mod session;
mod sync;

pub use context::SessionContext;
pub use dispatcher::{DispatchState, EventDispatcher};
pub use error::GatewayError;
pub use gateway::Gateway;
pub use message::{Numeric, Outbound, Prefix, SERVER_NAME};
pub use principal::{LoginGuard, Principal};
pub use registry::{Channel, ChannelKey, Ghost, GhostUpdate, Member, Registry, Rename};
pub use service::ServiceCommandRouter;
pub use session::Session;
pub use sync::ChannelSynchronizer;
