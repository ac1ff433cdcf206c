use seal_types::{PublicKey, StateRef, TransactionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("invalid signature by {signer} on transaction {tx_id}")]
    InvalidSignature { tx_id: TransactionId, signer: PublicKey },

    #[error("transaction {tx_id} is missing signatures from {} key(s)", missing.len())]
    SignaturesMissing {
        tx_id: TransactionId,
        missing: Vec<PublicKey>,
    },

    #[error("cannot resolve {state_ref}: producing transaction unknown")]
    UnresolvedState { state_ref: StateRef },

    #[error("state {state_ref} does not exist in its producing transaction")]
    OutputIndexOutOfRange { state_ref: StateRef },

    #[error("contract violation in {tx_id}: {reason}")]
    ContractViolation { tx_id: TransactionId, reason: String },

    #[error("malformed transaction: {0}")]
    Malformed(String),
}
