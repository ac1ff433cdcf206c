//! Seal node: assembles stores, the notary service and flows.
//!
//! The node:
//! - Opens (or is given) the durable stores and checks the schema version
//! - Runs a notary service when configured to
//! - Installs the platform session handlers and dispatches inbound sessions
//! - Resumes finality flows left unfinished by a previous run
//! - Finalises transactions on behalf of its caller

pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod shutdown;

pub use config::{NodeConfig, NotaryConfig, NotaryEntry};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use node::{NodeServices, NodeStores, SealNode};
pub use shutdown::ShutdownController;
