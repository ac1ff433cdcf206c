//! LMDB implementation of MetaStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use seal_store::{MetaStore, StoreError};

use crate::LmdbError;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

pub struct LmdbMetaStore {
    pub(crate) env: Arc<Env>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl MetaStore for LmdbMetaStore {
    fn schema_version(&self) -> Result<u32, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .meta_db
            .get(&rtxn, SCHEMA_VERSION_KEY)
            .map_err(LmdbError::from)?;
        match val {
            None => Ok(0),
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    StoreError::Corruption("schema_version has unexpected length".to_string())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.meta_db
            .put(&mut wtxn, SCHEMA_VERSION_KEY, &version.to_le_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
