//! Messages exchanged over flow sessions.
//!
//! Every payload sent on a session is wrapped in [`FlowMessage`] and encoded
//! with [`codec::encode`]. The receiving side decodes with
//! [`codec::decode`] and matches on the variant it expects at that step.

pub mod codec;
pub mod finality;
pub mod notary;

pub use codec::{decode, encode, CodecError, FlowMessage, MAX_MESSAGE_SIZE};
pub use finality::{Ack, TransactionPayload};
pub use notary::{
    ConflictKind, ConflictingState, NotarizationPayload, NotarizationRequest,
    NotarizationResponse, NotaryConflict, Verdict,
};
