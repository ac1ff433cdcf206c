//! Recipient side of finality.

use async_trait::async_trait;
use seal_messages::{Ack, FlowMessage, TransactionPayload};
use seal_transactions::SignedTransaction;
use std::sync::Arc;

use crate::{FlowContext, FlowError, FlowSession, Responder};

/// Receives a finalised transaction, checks it, records it and acknowledges.
///
/// Recording is idempotent, so a sender that retries after a lost `Ack`
/// simply gets another `Ack`.
pub struct ReceiveFinalityFlow;

impl ReceiveFinalityFlow {
    pub const TYPE_TAG: &'static str = "seal.ReceiveFinalityFlow";

    pub(crate) fn accept(ctx: &FlowContext, payload: &TransactionPayload) -> Result<(), FlowError> {
        record_dependencies(ctx, &payload.dependencies)?;

        let stx = &payload.transaction;
        // Notary signature included: the sender must have finished
        // notarisation before broadcasting.
        stx.verify_required_signatures()?;
        let ltx = ctx.verifier.resolve(stx)?;
        ctx.verifier.verify(&ltx)?;

        if ctx.transactions.record(stx)? {
            tracing::info!(tx_id = %stx.id(), "recorded finalised transaction");
        } else {
            tracing::debug!(tx_id = %stx.id(), "transaction already recorded");
        }
        Ok(())
    }
}

#[async_trait]
impl Responder for ReceiveFinalityFlow {
    async fn respond(&self, ctx: Arc<FlowContext>, mut session: FlowSession) -> Result<(), FlowError> {
        let payload = match session.receive().await? {
            FlowMessage::TransactionPayload(payload) => payload,
            other => {
                return Err(FlowError::UnexpectedMessage {
                    expected: "TransactionPayload",
                    received: other.kind(),
                })
            }
        };
        let tx_id = payload.transaction.id();

        match Self::accept(&ctx, &payload) {
            Ok(()) => session.send(&FlowMessage::Ack(Ack { tx_id })).await,
            Err(e) => {
                tracing::warn!(%tx_id, from = %session.counterparty(), error = %e, "refusing transaction");
                session.send(&FlowMessage::Error(e.to_string())).await?;
                Err(e)
            }
        }
    }
}

/// Record the transactions a received transaction depends on.
///
/// Each must carry all of its required signatures.
pub(crate) fn record_dependencies(
    ctx: &FlowContext,
    dependencies: &[SignedTransaction],
) -> Result<(), FlowError> {
    for dep in dependencies {
        if ctx.transactions.contains(&dep.id())? {
            continue;
        }
        dep.verify_required_signatures()?;
        ctx.transactions.record(dep)?;
    }
    Ok(())
}
