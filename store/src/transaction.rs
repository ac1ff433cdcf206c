//! Local record of finalised transactions.

use crate::StoreError;
use seal_transactions::SignedTransaction;
use seal_types::TransactionId;

/// Durable storage of signed transactions keyed by id.
pub trait TransactionStore: Send + Sync {
    /// Record a transaction.
    ///
    /// Returns `true` when the id was not known before. Recording an id that
    /// already exists keeps the union of both signature sets; signatures are
    /// never removed.
    fn record(&self, stx: &SignedTransaction) -> Result<bool, StoreError>;

    fn get(&self, tx_id: &TransactionId) -> Result<Option<SignedTransaction>, StoreError>;

    fn contains(&self, tx_id: &TransactionId) -> Result<bool, StoreError> {
        self.get(tx_id).map(|t| t.is_some())
    }

    fn count(&self) -> Result<u64, StoreError>;
}

/// Merge the signatures of `incoming` into `existing`.
///
/// Returns `None` when `incoming` adds nothing.
pub fn merge_signatures(
    existing: &SignedTransaction,
    incoming: &SignedTransaction,
) -> Option<SignedTransaction> {
    let known = existing.signers();
    let extra: Vec<_> = incoming
        .sigs()
        .iter()
        .filter(|s| !known.contains(&s.by))
        .cloned()
        .collect();
    (!extra.is_empty()).then(|| existing.with_additional_signatures(extra))
}
