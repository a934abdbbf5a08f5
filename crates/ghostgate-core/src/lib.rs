//! Ghostgate core.
//!
//! Sans-IO building blocks for exposing a chat backend as a line-oriented
//! protocol server. Nothing in this crate spawns tasks or touches sockets;
//! the async engine lives in `ghostgate-bridge`.
//!
//! # Components
//!
//! - [`tokenize`]: shell-style tokenizer for service account commands
//! - [`ThreadContext`]: per-channel hex tags emulating reply threads
//! - [`ContextStyle`]: placement of thread tags around message text
//! - [`CodeFence`]: stateful per-line code fence formatter
//! - [`AccessPolicy`]: include/exclude/allow-only channel filter
//! - [`Backend`] and [`Connector`]: the adapter contract
//! - [`BackendEvent`]: the event stream consumed by the dispatcher

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod command;
pub mod config;
pub mod context;
mod error;
pub mod event;
pub mod fence;
mod ids;
pub mod naming;
pub mod policy;
pub mod thread;
pub mod wrap;

pub use backend::{
    Backend, Connector, Credentials, EventSender, HistoryMessage, MessageTarget, SearchHit,
};
pub use command::tokenize;
pub use config::{BridgeConfig, GatewayConfig, GatewaySection, Settings};
pub use context::{ContextStyle, ContextualText, Placement};
pub use error::{BackendError, ConfigError, FormatError};
pub use event::{
    BackendEvent, ChannelInfo, ChannelKind, ChannelMessage, DirectMessage, FileInfo, MessageKind,
    MessageStyle, Presence, UserInfo,
};
pub use fence::{CodeFence, FenceKind, Highlighter, SyntaxStyle};
pub use ids::{ChannelId, MessageId, UserId};
pub use policy::{AccessPolicy, ServerRestriction};
pub use thread::{ThreadContext, ThreadTag};
