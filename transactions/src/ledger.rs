//! The resolved form of a transaction: input and reference pointers replaced
//! by the states they point at.

use crate::{Command, SignedTransaction, TransactionError, TransactionState};
use seal_types::{AbstractParty, Party, StateRef, TimeWindow, TransactionId};

/// A state together with the pointer that locates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateAndRef {
    pub state: TransactionState,
    pub state_ref: StateRef,
}

/// A fully linked transaction, ready for contract verification.
#[derive(Clone, Debug)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    pub inputs: Vec<StateAndRef>,
    pub references: Vec<StateAndRef>,
    pub outputs: Vec<TransactionState>,
    pub commands: Vec<Command>,
    pub notary: Option<Party>,
    pub time_window: Option<TimeWindow>,
}

impl LedgerTransaction {
    /// Resolve `stx` by looking up the transactions that produced its inputs
    /// and references.
    pub fn resolve<F>(stx: &SignedTransaction, mut lookup: F) -> Result<Self, TransactionError>
    where
        F: FnMut(&TransactionId) -> Option<SignedTransaction>,
    {
        let tx = stx.tx();
        let mut resolve_ref = |state_ref: &StateRef| -> Result<StateAndRef, TransactionError> {
            let producer = lookup(&state_ref.txhash).ok_or(TransactionError::UnresolvedState {
                state_ref: *state_ref,
            })?;
            let state = producer
                .tx()
                .outputs
                .get(state_ref.index as usize)
                .cloned()
                .ok_or(TransactionError::OutputIndexOutOfRange {
                    state_ref: *state_ref,
                })?;
            Ok(StateAndRef {
                state,
                state_ref: *state_ref,
            })
        };

        let inputs = tx
            .inputs
            .iter()
            .map(&mut resolve_ref)
            .collect::<Result<Vec<_>, _>>()?;
        let references = tx
            .references
            .iter()
            .map(&mut resolve_ref)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: stx.id(),
            inputs,
            references,
            outputs: tx.outputs.clone(),
            commands: tx.commands.clone(),
            notary: tx.notary.clone(),
            time_window: tx.time_window,
        })
    }

    /// Participants of every consumed and produced state, in order of
    /// appearance (outputs first). Reference states are read-only and their
    /// participants are not informed.
    pub fn participants(&self) -> Vec<AbstractParty> {
        self.outputs
            .iter()
            .chain(self.inputs.iter().map(|s| &s.state))
            .flat_map(|s| s.participants.iter().cloned())
            .collect()
    }
}
