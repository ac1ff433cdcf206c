//! Fluent construction of transactions.

use crate::{Command, SignedTransaction, TransactionState, WireTransaction};
use rand::RngCore;
use seal_types::{AbstractParty, KeyPair, Party, PublicKey, StateRef, TimeWindow};

/// Builds a [`WireTransaction`] against a chosen notary and signs it.
pub struct TransactionBuilder {
    notary: Party,
    tx: WireTransaction,
}

impl TransactionBuilder {
    pub fn new(notary: Party) -> Self {
        Self {
            tx: WireTransaction {
                inputs: Vec::new(),
                references: Vec::new(),
                outputs: Vec::new(),
                commands: Vec::new(),
                notary: Some(notary.clone()),
                time_window: None,
                salt: [0u8; 16],
            },
            notary,
        }
    }

    pub fn add_input(mut self, state_ref: StateRef) -> Self {
        self.tx.inputs.push(state_ref);
        self
    }

    pub fn add_reference(mut self, state_ref: StateRef) -> Self {
        self.tx.references.push(state_ref);
        self
    }

    /// Add an output governed by `contract`, assigned to the builder's notary.
    pub fn add_output(
        mut self,
        contract: &str,
        data: impl Into<Vec<u8>>,
        participants: impl IntoIterator<Item = AbstractParty>,
    ) -> Self {
        self.tx.outputs.push(TransactionState {
            contract: contract.to_string(),
            data: data.into(),
            participants: participants.into_iter().collect(),
            notary: self.notary.clone(),
        });
        self
    }

    pub fn add_command(mut self, name: &str, signers: Vec<PublicKey>) -> Self {
        self.tx.commands.push(Command {
            name: name.to_string(),
            signers,
        });
        self
    }

    pub fn time_window(mut self, window: TimeWindow) -> Self {
        self.tx.time_window = Some(window);
        self
    }

    pub fn salt(mut self, salt: [u8; 16]) -> Self {
        self.tx.salt = salt;
        self
    }

    pub fn random_salt(mut self) -> Self {
        rand::thread_rng().fill_bytes(&mut self.tx.salt);
        self
    }

    pub fn to_wire(&self) -> WireTransaction {
        self.tx.clone()
    }

    /// Sign the finished body with every given key.
    pub fn sign_with(self, keys: &[&KeyPair]) -> SignedTransaction {
        let id = self.tx.id();
        let sigs = keys
            .iter()
            .map(|k| seal_crypto::sign_transaction_id(&id, k))
            .collect();
        SignedTransaction::new(self.tx, sigs)
    }
}
