//! LMDB implementation of TransactionStore.
//!
//! Key: 32-byte transaction id. Value: bincode `SignedTransaction`.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use seal_store::transaction::merge_signatures;
use seal_store::{StoreError, TransactionStore};
use seal_transactions::SignedTransaction;
use seal_types::TransactionId;

use crate::LmdbError;

pub struct LmdbTransactionStore {
    pub(crate) env: Arc<Env>,
    pub(crate) transactions_db: Database<Bytes, Bytes>,
}

impl TransactionStore for LmdbTransactionStore {
    fn record(&self, stx: &SignedTransaction) -> Result<bool, StoreError> {
        let tx_id = stx.id();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        let existing = match self
            .transactions_db
            .get(&wtxn, tx_id.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Some(
                bincode::deserialize::<SignedTransaction>(bytes).map_err(LmdbError::from)?,
            ),
            None => None,
        };

        let (to_write, is_new) = match existing {
            None => (Some(stx.clone()), true),
            Some(current) => (merge_signatures(&current, stx), false),
        };

        if let Some(tx) = to_write {
            let bytes = bincode::serialize(&tx).map_err(LmdbError::from)?;
            self.transactions_db
                .put(&mut wtxn, tx_id.as_bytes(), &bytes)
                .map_err(LmdbError::from)?;
            wtxn.commit().map_err(LmdbError::from)?;
        }
        Ok(is_new)
    }

    fn get(&self, tx_id: &TransactionId) -> Result<Option<SignedTransaction>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .transactions_db
            .get(&rtxn, tx_id.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.transactions_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
