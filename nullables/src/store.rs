//! Nullable stores: thread-safe in-memory storage for testing.

use seal_store::transaction::merge_signatures;
use seal_store::{
    Checkpoint, CheckpointStore, FlowId, StoreError, TransactionStore, UniquenessLog,
    UniquenessRecord,
};
use seal_transactions::SignedTransaction;
use seal_types::{StateRef, TransactionId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// An in-memory consumed-state log.
///
/// `fail_next_appends(n)` makes the next `n` appends fail with a backend
/// error without writing, which lets tests simulate a storage outage.
#[derive(Default)]
pub struct NullUniquenessLog {
    records: Mutex<BTreeMap<StateRef, UniquenessRecord>>,
    failing_appends: AtomicUsize,
    appends: AtomicUsize,
}

impl NullUniquenessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_appends(&self, count: usize) {
        self.failing_appends.store(count, Ordering::SeqCst);
    }

    /// Number of successful appends so far.
    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<UniquenessRecord> {
        self.records.lock().unwrap().values().copied().collect()
    }
}

impl UniquenessLog for NullUniquenessLog {
    fn lookup(&self, refs: &[StateRef]) -> Result<Vec<UniquenessRecord>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(refs.iter().filter_map(|r| records.get(r).copied()).collect())
    }

    fn append(&self, batch: &[UniquenessRecord]) -> Result<(), StoreError> {
        let pending = self.failing_appends.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_appends.store(pending - 1, Ordering::SeqCst);
            return Err(StoreError::Backend("injected append failure".into()));
        }

        let mut records = self.records.lock().unwrap();
        if let Some(existing) = batch.iter().find(|r| records.contains_key(&r.state_ref)) {
            return Err(StoreError::WriteConflict(existing.state_ref.to_string()));
        }
        for record in batch {
            records.insert(record.state_ref, *record);
        }
        self.appends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn len(&self) -> Result<u64, StoreError> {
        Ok(self.records.lock().unwrap().len() as u64)
    }
}

/// An in-memory transaction store.
#[derive(Default)]
pub struct NullTransactionStore {
    transactions: Mutex<HashMap<TransactionId, SignedTransaction>>,
    failing: Mutex<bool>,
}

impl NullTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `record` fail until switched back off.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Seed a transaction directly, bypassing the failure switch.
    pub fn insert(&self, stx: SignedTransaction) {
        self.transactions.lock().unwrap().insert(stx.id(), stx);
    }
}

impl TransactionStore for NullTransactionStore {
    fn record(&self, stx: &SignedTransaction) -> Result<bool, StoreError> {
        if *self.failing.lock().unwrap() {
            return Err(StoreError::Backend("injected record failure".into()));
        }
        let mut transactions = self.transactions.lock().unwrap();
        match transactions.get(&stx.id()) {
            None => {
                transactions.insert(stx.id(), stx.clone());
                Ok(true)
            }
            Some(existing) => {
                if let Some(merged) = merge_signatures(existing, stx) {
                    transactions.insert(stx.id(), merged);
                }
                Ok(false)
            }
        }
    }

    fn get(&self, tx_id: &TransactionId) -> Result<Option<SignedTransaction>, StoreError> {
        Ok(self.transactions.lock().unwrap().get(tx_id).cloned())
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.transactions.lock().unwrap().len() as u64)
    }
}

/// An in-memory checkpoint store that keeps a history of every write.
#[derive(Default)]
pub struct NullCheckpointStore {
    checkpoints: Mutex<HashMap<FlowId, Checkpoint>>,
    history: Mutex<Vec<Checkpoint>>,
}

impl NullCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every checkpoint ever written, oldest first.
    pub fn history(&self) -> Vec<Checkpoint> {
        self.history.lock().unwrap().clone()
    }
}

impl CheckpointStore for NullCheckpointStore {
    fn put(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        self.history.lock().unwrap().push(checkpoint.clone());
        self.checkpoints
            .lock()
            .unwrap()
            .insert(checkpoint.flow_id, checkpoint.clone());
        Ok(())
    }

    fn get(&self, flow_id: &FlowId) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.checkpoints.lock().unwrap().get(flow_id).cloned())
    }

    fn remove(&self, flow_id: &FlowId) -> Result<(), StoreError> {
        self.checkpoints.lock().unwrap().remove(flow_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Checkpoint>, StoreError> {
        Ok(self.checkpoints.lock().unwrap().values().cloned().collect())
    }
}
