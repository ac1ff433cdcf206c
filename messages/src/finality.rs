//! Messages sent while distributing a finalised transaction.

use seal_transactions::SignedTransaction;
use seal_types::TransactionId;
use serde::{Deserialize, Serialize};

/// A finalised transaction plus the transactions its inputs and references
/// point at, so the receiver can resolve it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub transaction: SignedTransaction,
    pub dependencies: Vec<SignedTransaction>,
}

/// Receipt for a recorded transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub tx_id: TransactionId,
}
