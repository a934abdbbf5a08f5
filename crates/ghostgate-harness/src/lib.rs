//! Test harness for the ghostgate gateway.
//!
//! An in-memory chat backend implementing the adapter traits, plus a
//! [`Fixture`] that wires it to a gateway with one connected client. The
//! integration tests in `tests/` and the `ghostgate-console` binary are
//! built on these.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixture;
pub mod memory;

pub use fixture::{CLIENT_NICK, Fixture};
pub use memory::{MemoryBackend, MemoryConnector, MemoryWorld, PROTOCOL, SentMessage};
