//! The notarisation service: turns a request into a verdict.
//!
//! Order of checks: request/transaction consistency (validating mode also
//! resolves and verifies), then the time window against the notary clock,
//! then the uniqueness commit. Only an accepted commit is signed.

use seal_messages::{NotarizationRequest, Verdict};
use seal_transactions::{SignedTransaction, TransactionVerifier};
use seal_types::{Clock, KeyPair, Party};
use std::sync::Arc;

use crate::{CommitOutcome, NotaryError, UniquenessProvider};

/// How much of a transaction the notary inspects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotaryMode {
    /// Receives and fully verifies the transaction before committing.
    Validating,
    /// Trusts the declared states and time window.
    NonValidating,
}

pub struct NotaryService {
    identity: Party,
    keys: KeyPair,
    mode: NotaryMode,
    provider: UniquenessProvider,
    clock: Arc<dyn Clock>,
    verifier: Arc<dyn TransactionVerifier>,
}

impl NotaryService {
    pub fn new(
        identity: Party,
        keys: KeyPair,
        mode: NotaryMode,
        provider: UniquenessProvider,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn TransactionVerifier>,
    ) -> Result<Self, NotaryError> {
        if keys.public != identity.owning_key {
            return Err(NotaryError::Misconfigured(format!(
                "signing key {} does not belong to notary {}",
                keys.public, identity
            )));
        }
        Ok(Self {
            identity,
            keys,
            mode,
            provider,
            clock,
            verifier,
        })
    }

    pub fn identity(&self) -> &Party {
        &self.identity
    }

    pub fn mode(&self) -> NotaryMode {
        self.mode
    }

    pub fn provider(&self) -> &UniquenessProvider {
        &self.provider
    }

    /// Adjudicate `request`.
    ///
    /// `transaction` is required in validating mode and optional otherwise.
    /// Verdicts (including rejections) are `Ok`; only an unusable
    /// consumed-state log is an `Err`.
    pub fn notarize(
        &self,
        request: &NotarizationRequest,
        transaction: Option<&SignedTransaction>,
    ) -> Result<Verdict, NotaryError> {
        let tx_id = request.tx_id;

        if let Err(reason) = self.check_request(request, transaction) {
            tracing::info!(%tx_id, %reason, "notarisation request invalid");
            return Ok(Verdict::Invalid(reason));
        }

        let now = self.clock.now();
        if let Some(window) = request.time_window {
            if !window.contains(now) {
                tracing::info!(%tx_id, %now, %window, "outside time window");
                return Ok(Verdict::TimeWindowInvalid {
                    current_time: now,
                    window,
                });
            }
        }

        match self
            .provider
            .try_commit(&request.inputs, &request.references, tx_id, now)?
        {
            CommitOutcome::Accepted => {
                tracing::info!(%tx_id, inputs = request.inputs.len(), "transaction notarised");
                Ok(Verdict::Accepted(seal_crypto::sign_transaction_id(
                    &tx_id, &self.keys,
                )))
            }
            CommitOutcome::Rejected(conflict) => Ok(Verdict::Rejected(conflict)),
        }
    }

    fn check_request(
        &self,
        request: &NotarizationRequest,
        transaction: Option<&SignedTransaction>,
    ) -> Result<(), String> {
        if let Some(stx) = transaction {
            if stx.id() != request.tx_id {
                return Err(format!(
                    "transaction {} does not match requested id {}",
                    stx.id(),
                    request.tx_id
                ));
            }
        }

        match self.mode {
            NotaryMode::NonValidating => Ok(()),
            NotaryMode::Validating => {
                let stx = transaction
                    .ok_or_else(|| "validating notary requires the transaction".to_string())?;
                self.validate(request, stx)
            }
        }
    }

    fn validate(&self, request: &NotarizationRequest, stx: &SignedTransaction) -> Result<(), String> {
        let tx = stx.tx();
        if tx.inputs != request.inputs
            || tx.references != request.references
            || tx.time_window != request.time_window
        {
            return Err("request does not match transaction contents".to_string());
        }
        if tx.notary.as_ref() != Some(&self.identity) {
            return Err(format!("transaction is not assigned to notary {}", self.identity));
        }

        stx.verify_signatures_except(&[self.identity.owning_key])
            .map_err(|e| e.to_string())?;
        let ltx = self.verifier.resolve(stx).map_err(|e| e.to_string())?;
        self.verifier.verify(&ltx).map_err(|e| e.to_string())
    }
}
