//! Counterparty signing ahead of finality.
//!
//! The initiator opens a session under an application protocol, sends the
//! proposal with [`collect_signature`], adds the returned signature and then
//! hands the same session to [`FinalityFlow`](crate::FinalityFlow). The
//! counterparty runs [`SignAndWaitForCommitFlow`]: it checks and signs the
//! proposal, then waits on the session for the finalised transaction and
//! records it only if it is the one it signed.

use async_trait::async_trait;
use seal_messages::{Ack, FlowMessage, TransactionPayload};
use seal_transactions::SignedTransaction;
use seal_types::{DigitalSignature, KeyPair, PublicKey, TransactionId};
use std::sync::Arc;

use crate::notary_client::dependencies_of;
use crate::receive::{record_dependencies, ReceiveFinalityFlow};
use crate::{FlowContext, FlowError, FlowSession, Responder};

/// Application check run on a proposal before it is signed.
pub type ProposalCheck = dyn Fn(&SignedTransaction) -> Result<(), FlowError> + Send + Sync;

/// Ask the counterparty of `session` to sign `stx`.
///
/// The returned signature has been verified against the proposal's id and
/// belongs to a key the transaction requires.
pub async fn collect_signature(
    ctx: &FlowContext,
    session: &mut FlowSession,
    stx: &SignedTransaction,
) -> Result<DigitalSignature, FlowError> {
    let tx_id = stx.id();
    let request = FlowMessage::SignatureRequest(Box::new(TransactionPayload {
        dependencies: dependencies_of(ctx, stx)?,
        transaction: stx.clone(),
    }));
    let party = session.counterparty().to_string();

    match session.send_and_receive(&request).await? {
        FlowMessage::Signature(sig) => {
            if !stx.tx().required_signing_keys().contains(&sig.by) {
                return Err(FlowError::Counterparty {
                    party,
                    reason: format!("signed {tx_id} with key {} it does not require", sig.by),
                });
            }
            if !seal_crypto::verify_transaction_signature(&tx_id, &sig) {
                return Err(FlowError::Counterparty {
                    party,
                    reason: format!("signature does not verify for {tx_id}"),
                });
            }
            tracing::debug!(%tx_id, %party, "counterparty signed");
            Ok(sig)
        }
        FlowMessage::Error(reason) => Err(FlowError::Counterparty { party, reason }),
        other => Err(FlowError::UnexpectedMessage {
            expected: "Signature",
            received: other.kind(),
        }),
    }
}

/// Signs a proposal, then records the finalised transaction, which must be
/// the one it signed.
pub struct SignAndWaitForCommitFlow {
    keys: KeyPair,
    check: Arc<ProposalCheck>,
}

impl SignAndWaitForCommitFlow {
    pub const TYPE_TAG: &'static str = "seal.SignAndWaitForCommitFlow";

    pub fn new(keys: KeyPair, check: Arc<ProposalCheck>) -> Self {
        Self { keys, check }
    }

    fn sign(&self, ctx: &FlowContext, payload: &TransactionPayload) -> Result<DigitalSignature, FlowError> {
        let stx = &payload.transaction;
        if !stx.tx().required_signing_keys().contains(&self.keys.public) {
            return Err(FlowError::Validation(format!(
                "{} is not a required signer of {}",
                self.keys.public,
                stx.id()
            )));
        }

        record_dependencies(ctx, &payload.dependencies)?;
        let mut may_be_missing: Vec<PublicKey> = stx.tx().notary.iter().map(|n| n.owning_key).collect();
        may_be_missing.push(self.keys.public);
        stx.verify_signatures_except(&may_be_missing)?;
        let ltx = ctx.verifier.resolve(stx)?;
        ctx.verifier.verify(&ltx)?;
        (self.check)(stx)?;

        Ok(seal_crypto::sign_transaction_id(&stx.id(), &self.keys))
    }

    async fn wait_for_commit(
        ctx: &FlowContext,
        session: &mut FlowSession,
        signed: TransactionId,
    ) -> Result<(), FlowError> {
        let payload = match session.receive().await? {
            FlowMessage::TransactionPayload(payload) => payload,
            FlowMessage::Error(reason) => {
                return Err(FlowError::Counterparty {
                    party: session.counterparty().to_string(),
                    reason,
                })
            }
            other => {
                return Err(FlowError::UnexpectedMessage {
                    expected: "TransactionPayload",
                    received: other.kind(),
                })
            }
        };

        let received = payload.transaction.id();
        let accepted = if received == signed {
            ReceiveFinalityFlow::accept(ctx, &payload)
        } else {
            Err(FlowError::Validation(format!(
                "signed {signed} but received finalised {received}"
            )))
        };
        match accepted {
            Ok(()) => session.send(&FlowMessage::Ack(Ack { tx_id: received })).await,
            Err(e) => {
                session.send(&FlowMessage::Error(e.to_string())).await?;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Responder for SignAndWaitForCommitFlow {
    async fn respond(&self, ctx: Arc<FlowContext>, mut session: FlowSession) -> Result<(), FlowError> {
        let payload = match session.receive().await? {
            FlowMessage::SignatureRequest(payload) => payload,
            other => {
                return Err(FlowError::UnexpectedMessage {
                    expected: "SignatureRequest",
                    received: other.kind(),
                })
            }
        };
        let tx_id = payload.transaction.id();

        match self.sign(&ctx, &payload) {
            Ok(sig) => session.send(&FlowMessage::Signature(sig)).await?,
            Err(e) => {
                tracing::warn!(%tx_id, from = %session.counterparty(), error = %e, "refusing to sign");
                session.send(&FlowMessage::Error(e.to_string())).await?;
                return Err(e);
            }
        }
        tracing::debug!(%tx_id, "signed proposal, waiting for commit");

        Self::wait_for_commit(&ctx, &mut session, tx_id).await
    }
}
