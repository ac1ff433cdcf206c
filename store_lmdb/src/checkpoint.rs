//! LMDB implementation of CheckpointStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use seal_store::{Checkpoint, CheckpointStore, FlowId, StoreError};

use crate::LmdbError;

pub struct LmdbCheckpointStore {
    pub(crate) env: Arc<Env>,
    pub(crate) checkpoints_db: Database<Bytes, Bytes>,
}

impl CheckpointStore for LmdbCheckpointStore {
    fn put(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let bytes = bincode::serialize(checkpoint).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.checkpoints_db
            .put(&mut wtxn, checkpoint.flow_id.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get(&self, flow_id: &FlowId) -> Result<Option<Checkpoint>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .checkpoints_db
            .get(&rtxn, flow_id.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, flow_id: &FlowId) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.checkpoints_db
            .delete(&mut wtxn, flow_id.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<Checkpoint>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.checkpoints_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut checkpoints = Vec::new();
        for entry in iter {
            let (_key, bytes) = entry.map_err(LmdbError::from)?;
            checkpoints.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(checkpoints)
    }
}
