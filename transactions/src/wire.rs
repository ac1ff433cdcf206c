//! The transaction body that signatures are taken over.

use seal_types::{AbstractParty, Party, PublicKey, StateRef, TimeWindow, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An output state: opaque contract data plus the parties that must learn of
/// the transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    /// Name of the contract that governs this state.
    pub contract: String,
    /// Opaque contract payload.
    pub data: Vec<u8>,
    pub participants: Vec<AbstractParty>,
    /// Notary responsible for this state's consumption.
    pub notary: Party,
}

/// A command with the keys that must sign for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub signers: Vec<PublicKey>,
}

/// The content-addressed body of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTransaction {
    pub inputs: Vec<StateRef>,
    pub references: Vec<StateRef>,
    pub outputs: Vec<TransactionState>,
    pub commands: Vec<Command>,
    pub notary: Option<Party>,
    pub time_window: Option<TimeWindow>,
    /// Distinguishes otherwise identical transactions.
    pub salt: [u8; 16],
}

impl WireTransaction {
    /// Content id: Blake2b over the canonical bincode encoding.
    pub fn id(&self) -> TransactionId {
        let bytes = bincode::serialize(self).expect("WireTransaction is always serializable");
        seal_crypto::transaction_id_of(&bytes)
    }

    /// Whether this transaction touches anything a notary must adjudicate.
    pub fn requires_notarization(&self) -> bool {
        !self.inputs.is_empty() || !self.references.is_empty() || self.time_window.is_some()
    }

    /// Every key that must sign, including the notary's when notarization
    /// is required.
    pub fn required_signing_keys(&self) -> BTreeSet<PublicKey> {
        let mut keys: BTreeSet<PublicKey> = self
            .commands
            .iter()
            .flat_map(|c| c.signers.iter().copied())
            .collect();
        if self.requires_notarization() {
            if let Some(notary) = &self.notary {
                keys.insert(notary.owning_key);
            }
        }
        keys
    }

    /// The ref at `index` among this transaction's outputs.
    pub fn out_ref(&self, index: u32) -> StateRef {
        StateRef::new(self.id(), index)
    }
}
