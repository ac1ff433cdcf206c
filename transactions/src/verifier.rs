//! The contract-verification collaborator.
//!
//! Contract execution itself lives outside this workspace. The finality flow
//! and the validating notary only depend on [`TransactionVerifier`];
//! [`BasicVerifier`] supplies resolution plus the ledger-level structural
//! rules, and hands contract-specific checks to registered rule functions.

use crate::{LedgerTransaction, SignedTransaction, TransactionError};
use seal_types::TransactionId;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Resolves transactions into their fully linked form and verifies them.
pub trait TransactionVerifier: Send + Sync {
    fn resolve(&self, stx: &SignedTransaction) -> Result<LedgerTransaction, TransactionError>;

    fn verify(&self, ltx: &LedgerTransaction) -> Result<(), TransactionError>;
}

type Lookup = Arc<dyn Fn(&TransactionId) -> Option<SignedTransaction> + Send + Sync>;
type ContractRule = Arc<dyn Fn(&LedgerTransaction) -> Result<(), String> + Send + Sync>;

/// Verifier backed by a transaction lookup and a table of contract rules.
#[derive(Clone)]
pub struct BasicVerifier {
    lookup: Lookup,
    contracts: HashMap<String, ContractRule>,
}

impl BasicVerifier {
    pub fn new(
        lookup: impl Fn(&TransactionId) -> Option<SignedTransaction> + Send + Sync + 'static,
    ) -> Self {
        Self {
            lookup: Arc::new(lookup),
            contracts: HashMap::new(),
        }
    }

    /// Register the rule run for every transaction touching `contract` states.
    pub fn with_contract(
        mut self,
        contract: &str,
        rule: impl Fn(&LedgerTransaction) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.contracts.insert(contract.to_string(), Arc::new(rule));
        self
    }

    fn check_structure(ltx: &LedgerTransaction) -> Result<(), TransactionError> {
        let violation = |reason: &str| TransactionError::ContractViolation {
            tx_id: ltx.id,
            reason: reason.to_string(),
        };

        let inputs: BTreeSet<_> = ltx.inputs.iter().map(|s| s.state_ref).collect();
        if inputs.len() != ltx.inputs.len() {
            return Err(violation("duplicate input state"));
        }
        let references: BTreeSet<_> = ltx.references.iter().map(|s| s.state_ref).collect();
        if references.len() != ltx.references.len() {
            return Err(violation("duplicate reference state"));
        }
        if !inputs.is_disjoint(&references) {
            return Err(violation("a state cannot be both input and reference"));
        }
        if ltx.inputs.is_empty() && ltx.outputs.is_empty() {
            return Err(violation("transaction has neither inputs nor outputs"));
        }

        let needs_notary =
            !ltx.inputs.is_empty() || !ltx.references.is_empty() || ltx.time_window.is_some();
        match &ltx.notary {
            None if needs_notary => Err(violation("notary required but not named")),
            None => Ok(()),
            Some(notary) => {
                if ltx.inputs.iter().any(|s| &s.state.notary != notary) {
                    return Err(violation("input state assigned to a different notary"));
                }
                if ltx.outputs.iter().any(|s| &s.notary != notary) {
                    return Err(violation("output state assigned to a different notary"));
                }
                Ok(())
            }
        }
    }
}

impl TransactionVerifier for BasicVerifier {
    fn resolve(&self, stx: &SignedTransaction) -> Result<LedgerTransaction, TransactionError> {
        LedgerTransaction::resolve(stx, |id| (self.lookup)(id))
    }

    fn verify(&self, ltx: &LedgerTransaction) -> Result<(), TransactionError> {
        Self::check_structure(ltx)?;

        let touched: BTreeSet<&str> = ltx
            .outputs
            .iter()
            .chain(ltx.inputs.iter().map(|s| &s.state))
            .map(|s| s.contract.as_str())
            .collect();
        for contract in touched {
            if let Some(rule) = self.contracts.get(contract) {
                rule(ltx).map_err(|reason| TransactionError::ContractViolation {
                    tx_id: ltx.id,
                    reason: format!("{contract}: {reason}"),
                })?;
            }
        }
        Ok(())
    }
}
