//! Flows: the long-running, multi-party protocols of the notarisation layer.
//!
//! Each flow is an explicit state value that is checkpointed at every
//! suspension point, so a node can resume it after a restart by dispatching
//! on the saved state tag.
//!
//! ## Module overview
//!
//! - [`finality`]: verify, notarise if needed, record, broadcast.
//! - [`notary_client`]: request a verdict from the transaction's notary.
//! - [`receive`]: the counterpart run by broadcast recipients.
//! - [`notary_flow`]: the counterpart run by the notary.
//! - [`signing`]: counterparty signatures collected ahead of finality.
//! - [`registry`]: initiating protocol → responder table and session opening.
//! - [`session`]: typed, timed message exchange over one channel.
//! - [`checkpoint`]: persistence of flow state values.
//! - [`context`] / [`identity`]: the services a flow runs against.

pub mod checkpoint;
pub mod context;
pub mod error;
pub mod finality;
pub mod identity;
pub mod notary_client;
pub mod notary_flow;
pub mod receive;
pub mod registry;
pub mod session;
pub mod signing;

pub use checkpoint::{new_flow_id, Checkpointer};
pub use context::{FlowContext, NotaryInfo};
pub use error::FlowError;
pub use finality::{
    CancelHandle, FinalityFlow, FinalityOptions, FinalityOutcome, FinalityState, Undelivered,
};
pub use identity::{IdentityService, StaticIdentityService};
pub use notary_client::{NotaryClient, NotaryClientState};
pub use notary_flow::NotaryServiceFlow;
pub use receive::ReceiveFinalityFlow;
pub use registry::{
    handle_inbound, install_core_handlers, HandlerDescriptor, HandlerOrigin, RegistryError,
    Responder, SessionRegistry,
};
pub use session::FlowSession;
pub use signing::{collect_signature, ProposalCheck, SignAndWaitForCommitFlow};

/// Initiating protocol of [`FinalityFlow`] broadcasts.
pub const FINALITY_PROTOCOL: &str = "seal.finality";

/// Initiating protocol of [`NotaryClient`] requests.
pub const NOTARY_PROTOCOL: &str = "seal.notary";
