//! Session transport for flows.
//!
//! A [`Transport`] opens a bidirectional, ordered [`Channel`] to one
//! counterparty for one protocol run. The receiving node is handed an
//! [`InboundSession`] naming the initiating protocol, which it uses to pick
//! the handler to run.
//!
//! [`MemoryNetwork`] connects any number of in-process nodes and can inject
//! unreachable parties and lost messages.

pub mod channel;
pub mod error;
pub mod memory;

pub use channel::{Channel, InboundSession, Transport};
pub use error::TransportError;
pub use memory::{MemoryNetwork, MemoryTransport};
