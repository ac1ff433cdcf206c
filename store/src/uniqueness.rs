//! Append-only log of consumed states.

use crate::StoreError;
use seal_types::{StateRef, Timestamp, TransactionId};
use serde::{Deserialize, Serialize};

/// Records that `state_ref` was consumed by `consuming_tx`.
///
/// Created once per state and never updated or deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquenessRecord {
    pub state_ref: StateRef,
    pub consuming_tx: TransactionId,
    pub committed_at: Timestamp,
}

/// Durable, append-only mapping `StateRef -> UniquenessRecord`.
///
/// Callers serialise overlapping appends themselves; the log only has to
/// guarantee that a batch is all-or-nothing and that an existing key is never
/// overwritten.
pub trait UniquenessLog: Send + Sync {
    /// Existing records for any of `refs`, in the order of `refs`.
    fn lookup(&self, refs: &[StateRef]) -> Result<Vec<UniquenessRecord>, StoreError>;

    /// Durably append every record in one atomic write.
    ///
    /// Fails with [`StoreError::WriteConflict`] without writing anything if
    /// any key already exists.
    fn append(&self, records: &[UniquenessRecord]) -> Result<(), StoreError>;

    /// Number of records in the log.
    fn len(&self) -> Result<u64, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }
}
