//! Notary request/response messages and the verdict type.

use seal_transactions::SignedTransaction;
use seal_types::{DigitalSignature, StateRef, TimeWindow, Timestamp, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a submitter asks the notary to commit.
///
/// Replaying the same request is safe: the notary treats refs already owned
/// by `tx_id` as committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizationRequest {
    pub tx_id: TransactionId,
    pub inputs: Vec<StateRef>,
    pub references: Vec<StateRef>,
    pub time_window: Option<TimeWindow>,
}

impl NotarizationRequest {
    pub fn for_transaction(stx: &SignedTransaction) -> Self {
        let tx = stx.tx();
        Self {
            tx_id: stx.id(),
            inputs: tx.inputs.clone(),
            references: tx.references.clone(),
            time_window: tx.time_window,
        }
    }
}

/// A request plus, for validating notaries only, the transaction itself and
/// the transactions that produced its inputs and references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizationPayload {
    pub request: NotarizationRequest,
    pub transaction: Option<SignedTransaction>,
    pub dependencies: Vec<SignedTransaction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizationResponse {
    pub verdict: Verdict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// An input already consumed by another transaction.
    Input,
    /// A reference state that has since been consumed.
    Reference,
}

/// One state the notary refused to hand to the requesting transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingState {
    pub state_ref: StateRef,
    pub kind: ConflictKind,
    pub consuming_tx: TransactionId,
    pub committed_at: Timestamp,
}

/// Why a request lost to an earlier commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotaryConflict {
    /// The transaction that was refused.
    pub tx_id: TransactionId,
    pub states: Vec<ConflictingState>,
}

impl NotaryConflict {
    /// Every earlier transaction that won one of the contested states.
    pub fn winners(&self) -> BTreeSet<TransactionId> {
        self.states.iter().map(|s| s.consuming_tx).collect()
    }

    pub fn conflicting_refs(&self) -> Vec<StateRef> {
        self.states.iter().map(|s| s.state_ref).collect()
    }
}

impl fmt::Display for NotaryConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conflicts on", self.tx_id)?;
        for s in &self.states {
            write!(f, " {} (consumed by {})", s.state_ref, s.consuming_tx)?;
        }
        Ok(())
    }
}

/// The notary's answer to a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Committed; the signature is over the requested transaction id.
    Accepted(DigitalSignature),
    Rejected(NotaryConflict),
    /// The notary's clock was outside the declared window.
    TimeWindowInvalid {
        current_time: Timestamp,
        window: TimeWindow,
    },
    /// The request could not be checked (malformed, mismatched, or failed
    /// validation).
    Invalid(String),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}
