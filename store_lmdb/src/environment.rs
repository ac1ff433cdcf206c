//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::{
    LmdbCheckpointStore, LmdbError, LmdbMetaStore, LmdbTransactionStore, LmdbUniquenessLog,
};

/// Number of named databases opened below.
const MAX_DBS: u32 = 8;

/// Default map size: 1 GiB of address space (grows on disk lazily).
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// The LMDB environment and every database handle.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) consumed_states_db: Database<Bytes, Bytes>,
    pub(crate) transactions_db: Database<Bytes, Bytes>,
    pub(crate) checkpoints_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an environment in `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: each environment directory is opened once per process; the
        // node owns its data directory exclusively.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let consumed_states_db = env.create_database(&mut wtxn, Some("consumed_states"))?;
        let transactions_db = env.create_database(&mut wtxn, Some("transactions"))?;
        let checkpoints_db = env.create_database(&mut wtxn, Some("checkpoints"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            consumed_states_db,
            transactions_db,
            checkpoints_db,
            meta_db,
        })
    }

    pub(crate) fn env(&self) -> &Env {
        &self.env
    }

    pub fn uniqueness_log(&self) -> LmdbUniquenessLog {
        LmdbUniquenessLog {
            env: Arc::clone(&self.env),
            consumed_states_db: self.consumed_states_db,
        }
    }

    pub fn transaction_store(&self) -> LmdbTransactionStore {
        LmdbTransactionStore {
            env: Arc::clone(&self.env),
            transactions_db: self.transactions_db,
        }
    }

    pub fn checkpoint_store(&self) -> LmdbCheckpointStore {
        LmdbCheckpointStore {
            env: Arc::clone(&self.env),
            checkpoints_db: self.checkpoints_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }

    /// Flush the environment to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env().force_sync()?;
        Ok(())
    }
}
