//! Uniqueness provider: first-writer-wins commits of consumed states.
//!
//! Locking is striped by `StateRef`: a commit takes the sorted set of stripes
//! its inputs and references hash to, so commits over disjoint states on
//! different stripes never wait on each other, and acquiring in ascending
//! order cannot deadlock. The lock covers lookup plus durable append, which
//! makes check-then-write atomic for every overlapping request.

use seal_messages::{ConflictKind, ConflictingState, NotaryConflict};
use seal_store::{StoreError, UniquenessLog, UniquenessRecord};
use seal_types::{StateRef, Timestamp, TransactionId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::NotaryError;

/// Default number of lock stripes.
pub const DEFAULT_STRIPES: usize = 256;

/// Attempts after a concurrent writer outside this provider got in first.
const MAX_COMMIT_ATTEMPTS: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Every input is now owned by the transaction (possibly from an earlier
    /// identical request).
    Accepted,
    Rejected(NotaryConflict),
}

pub struct UniquenessProvider {
    log: Arc<dyn UniquenessLog>,
    stripes: Vec<Mutex<()>>,
}

impl UniquenessProvider {
    pub fn new(log: Arc<dyn UniquenessLog>) -> Self {
        Self::with_stripes(log, DEFAULT_STRIPES)
    }

    pub fn with_stripes(log: Arc<dyn UniquenessLog>, stripes: usize) -> Self {
        Self {
            log,
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe_of(&self, state_ref: &StateRef) -> usize {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&state_ref.txhash.as_bytes()[..8]);
        let mixed = u64::from_le_bytes(prefix)
            ^ u64::from(state_ref.index).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        (mixed % self.stripes.len() as u64) as usize
    }

    fn lock_stripes<'r>(&self, refs: impl Iterator<Item = &'r StateRef>) -> Vec<MutexGuard<'_, ()>> {
        let indices: BTreeSet<usize> = refs.map(|r| self.stripe_of(r)).collect();
        // The guarded value is `()`, so a poisoned stripe carries no broken state.
        indices
            .into_iter()
            .map(|i| self.stripes[i].lock().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }

    /// Commit `inputs` as consumed by `tx_id`.
    ///
    /// `references` must not have been consumed by any other transaction; they
    /// are checked but never recorded. The outcome is returned only after
    /// any new records are durable.
    pub fn try_commit(
        &self,
        inputs: &[StateRef],
        references: &[StateRef],
        tx_id: TransactionId,
        timestamp: Timestamp,
    ) -> Result<CommitOutcome, NotaryError> {
        let inputs = sorted_unique(inputs);
        let references = sorted_unique(references);

        let _guards = self.lock_stripes(inputs.iter().chain(references.iter()));

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.commit_locked(&inputs, &references, tx_id, timestamp) {
                Err(NotaryError::Storage(StoreError::WriteConflict(key)))
                    if attempt < MAX_COMMIT_ATTEMPTS =>
                {
                    tracing::warn!(%tx_id, %key, "consumed-state log changed underneath, re-checking");
                }
                other => return other,
            }
        }
    }

    fn commit_locked(
        &self,
        inputs: &[StateRef],
        references: &[StateRef],
        tx_id: TransactionId,
        timestamp: Timestamp,
    ) -> Result<CommitOutcome, NotaryError> {
        let consumed_inputs: BTreeMap<StateRef, UniquenessRecord> = self
            .log
            .lookup(inputs)?
            .into_iter()
            .map(|r| (r.state_ref, r))
            .collect();
        let consumed_references = self.log.lookup(references)?;

        let mut states: Vec<ConflictingState> = consumed_inputs
            .values()
            .filter(|r| r.consuming_tx != tx_id)
            .map(|r| conflicting(r, ConflictKind::Input))
            .collect();
        states.extend(
            consumed_references
                .iter()
                .filter(|r| r.consuming_tx != tx_id)
                .map(|r| conflicting(r, ConflictKind::Reference)),
        );

        if !states.is_empty() {
            let conflict = NotaryConflict { tx_id, states };
            tracing::info!(%tx_id, winners = conflict.winners().len(), "double spend rejected");
            return Ok(CommitOutcome::Rejected(conflict));
        }

        let fresh: Vec<UniquenessRecord> = inputs
            .iter()
            .filter(|r| !consumed_inputs.contains_key(r))
            .map(|state_ref| UniquenessRecord {
                state_ref: *state_ref,
                consuming_tx: tx_id,
                committed_at: timestamp,
            })
            .collect();

        if fresh.is_empty() {
            tracing::debug!(%tx_id, "inputs already committed to this transaction");
            return Ok(CommitOutcome::Accepted);
        }

        self.log.append(&fresh)?;
        tracing::debug!(%tx_id, states = fresh.len(), "inputs committed");
        Ok(CommitOutcome::Accepted)
    }

    /// Who consumed `state_ref`, if anyone.
    pub fn record_for(&self, state_ref: &StateRef) -> Result<Option<UniquenessRecord>, NotaryError> {
        Ok(self
            .log
            .lookup(std::slice::from_ref(state_ref))?
            .into_iter()
            .next())
    }

    /// Number of states ever consumed through this log.
    pub fn committed_count(&self) -> Result<u64, NotaryError> {
        Ok(self.log.len()?)
    }
}

fn sorted_unique(refs: &[StateRef]) -> Vec<StateRef> {
    let set: BTreeSet<StateRef> = refs.iter().copied().collect();
    set.into_iter().collect()
}

fn conflicting(record: &UniquenessRecord, kind: ConflictKind) -> ConflictingState {
    ConflictingState {
        state_ref: record.state_ref,
        kind,
        consuming_tx: record.consuming_tx,
        committed_at: record.committed_at,
    }
}
