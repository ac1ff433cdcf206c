//! LMDB implementation of UniquenessLog.
//!
//! Key: `StateRef::to_key_bytes()` (36 bytes). Value: bincode
//! `UniquenessRecord`. Keys are only ever inserted.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use seal_store::{StoreError, UniquenessLog, UniquenessRecord};
use seal_types::StateRef;

use crate::LmdbError;

pub struct LmdbUniquenessLog {
    pub(crate) env: Arc<Env>,
    pub(crate) consumed_states_db: Database<Bytes, Bytes>,
}

impl UniquenessLog for LmdbUniquenessLog {
    fn lookup(&self, refs: &[StateRef]) -> Result<Vec<UniquenessRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut found = Vec::new();
        for state_ref in refs {
            let key = state_ref.to_key_bytes();
            if let Some(bytes) = self
                .consumed_states_db
                .get(&rtxn, &key)
                .map_err(LmdbError::from)?
            {
                let record: UniquenessRecord =
                    bincode::deserialize(bytes).map_err(LmdbError::from)?;
                found.push(record);
            }
        }
        Ok(found)
    }

    fn append(&self, records: &[UniquenessRecord]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        for record in records {
            let key = record.state_ref.to_key_bytes();
            if self
                .consumed_states_db
                .get(&wtxn, &key)
                .map_err(LmdbError::from)?
                .is_some()
            {
                // Dropping the transaction aborts the whole batch.
                return Err(StoreError::WriteConflict(record.state_ref.to_string()));
            }
            let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
            self.consumed_states_db
                .put(&mut wtxn, &key, &bytes)
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn len(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self
            .consumed_states_db
            .len(&rtxn)
            .map_err(LmdbError::from)?;
        Ok(count)
    }
}
