//! Nullable verifier: resolves against an in-memory map and applies a
//! switchable verdict.

use seal_transactions::{
    LedgerTransaction, SignedTransaction, TransactionError, TransactionVerifier,
};
use seal_types::TransactionId;
use std::collections::HashMap;
use std::sync::Mutex;

/// A verifier whose contract check can be set to fail.
#[derive(Default)]
pub struct NullVerifier {
    known: Mutex<HashMap<TransactionId, SignedTransaction>>,
    rejection: Mutex<Option<String>>,
}

impl NullVerifier {
    /// Accepts everything it can resolve.
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Rejects every transaction with `reason`.
    pub fn rejecting(reason: &str) -> Self {
        let verifier = Self::default();
        verifier.reject_with(Some(reason.to_string()));
        verifier
    }

    pub fn reject_with(&self, reason: Option<String>) {
        *self.rejection.lock().unwrap() = reason;
    }

    /// Make `stx` available for input resolution.
    pub fn add_known(&self, stx: SignedTransaction) {
        self.known.lock().unwrap().insert(stx.id(), stx);
    }
}

impl TransactionVerifier for NullVerifier {
    fn resolve(&self, stx: &SignedTransaction) -> Result<LedgerTransaction, TransactionError> {
        let known = self.known.lock().unwrap();
        LedgerTransaction::resolve(stx, |id| known.get(id).cloned())
    }

    fn verify(&self, ltx: &LedgerTransaction) -> Result<(), TransactionError> {
        match self.rejection.lock().unwrap().as_ref() {
            Some(reason) => Err(TransactionError::ContractViolation {
                tx_id: ltx.id,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}
