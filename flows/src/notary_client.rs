//! Client side of notarisation.
//!
//! States: `Idle -> RequestSent -> {Accepted, Rejected, TimedOut}`. The
//! caller persists every state handed to its checkpoint callback; a flow
//! resumed in `RequestSent` replays the identical request, which the notary
//! answers idempotently.

use seal_messages::{FlowMessage, NotarizationPayload, NotarizationRequest, Verdict};
use seal_transactions::SignedTransaction;
use seal_types::{DigitalSignature, Party};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{FlowContext, FlowError, NOTARY_PROTOCOL};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotaryClientState {
    Idle,
    RequestSent {
        request: NotarizationRequest,
        attempt: u32,
    },
    Accepted(DigitalSignature),
    Rejected,
    TimedOut,
}

pub struct NotaryClient<'a> {
    ctx: &'a FlowContext,
}

impl<'a> NotaryClient<'a> {
    pub fn new(ctx: &'a FlowContext) -> Self {
        Self { ctx }
    }

    /// Obtain the notary's signature over `stx`, starting from `state`.
    ///
    /// `persist` is called with every new state before the matching network
    /// step happens.
    pub async fn notarise<F>(
        &self,
        stx: &SignedTransaction,
        state: NotaryClientState,
        mut persist: F,
    ) -> Result<DigitalSignature, FlowError>
    where
        F: FnMut(&NotaryClientState) -> Result<(), FlowError> + Send,
    {
        let notary = stx
            .tx()
            .notary
            .clone()
            .ok_or_else(|| FlowError::Validation("transaction names no notary".into()))?;
        let info = self
            .ctx
            .notary_info(&notary)
            .ok_or_else(|| FlowError::Validation(format!("{notary} is not a known notary")))?;

        let (request, first_attempt) = match state {
            NotaryClientState::Idle => (NotarizationRequest::for_transaction(stx), 1),
            NotaryClientState::RequestSent { request, attempt } => (request, attempt),
            NotaryClientState::Accepted(sig) => return Ok(sig),
            NotaryClientState::Rejected | NotaryClientState::TimedOut => {
                return Err(FlowError::Checkpoint(
                    "notary client already finished unsuccessfully".into(),
                ))
            }
        };
        if request.tx_id != stx.id() {
            return Err(FlowError::Checkpoint("saved request is for another transaction".into()));
        }

        let payload = if info.validating {
            NotarizationPayload {
                request,
                transaction: Some(stx.clone()),
                dependencies: dependencies_of(self.ctx, stx)?,
            }
        } else {
            NotarizationPayload {
                request,
                transaction: None,
                dependencies: Vec::new(),
            }
        };

        let policy = self.ctx.retry;
        let mut last_error = None;
        for attempt in first_attempt..=policy.attempts().max(first_attempt) {
            tokio::time::sleep(policy.backoff_before(attempt)).await;
            persist(&NotaryClientState::RequestSent {
                request: payload.request.clone(),
                attempt,
            })?;

            match self.round_trip(&notary, &payload).await {
                Ok(verdict) => return self.interpret(stx, &notary, verdict, &mut persist),
                Err(e) if e.is_transient() => {
                    tracing::warn!(tx_id = %stx.id(), %notary, attempt, error = %e, "notary round trip failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        persist(&NotaryClientState::TimedOut)?;
        Err(FlowError::Transport(format!(
            "no verdict from {notary}: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn round_trip(
        &self,
        notary: &Party,
        payload: &NotarizationPayload,
    ) -> Result<Verdict, FlowError> {
        let mut session = self.ctx.registry.open_session(notary, NOTARY_PROTOCOL).await?;
        let reply = session
            .send_and_receive(&FlowMessage::NotarizationRequest(payload.clone()))
            .await?;
        match reply {
            FlowMessage::NotarizationResponse(response) => Ok(response.verdict),
            // The notary could not reach its own log; the request is safe
            // to repeat.
            FlowMessage::Error(reason) => Err(FlowError::Transport(format!("{notary}: {reason}"))),
            other => Err(FlowError::UnexpectedMessage {
                expected: "NotarizationResponse",
                received: other.kind(),
            }),
        }
    }

    fn interpret<F>(
        &self,
        stx: &SignedTransaction,
        notary: &Party,
        verdict: Verdict,
        persist: &mut F,
    ) -> Result<DigitalSignature, FlowError>
    where
        F: FnMut(&NotaryClientState) -> Result<(), FlowError>,
    {
        let tx_id = stx.id();
        match verdict {
            Verdict::Accepted(sig) => {
                if sig.by != notary.owning_key || !seal_crypto::verify_transaction_signature(&tx_id, &sig) {
                    return Err(FlowError::Validation(format!(
                        "{notary} returned a signature that does not verify for {tx_id}"
                    )));
                }
                persist(&NotaryClientState::Accepted(sig.clone()))?;
                tracing::info!(%tx_id, %notary, "notarised");
                Ok(sig)
            }
            Verdict::Rejected(conflict) => {
                persist(&NotaryClientState::Rejected)?;
                tracing::warn!(%tx_id, %conflict, "notary rejected double spend");
                Err(FlowError::NotarizationConflict(conflict))
            }
            Verdict::TimeWindowInvalid {
                current_time,
                window,
            } => {
                persist(&NotaryClientState::Rejected)?;
                Err(FlowError::TimeWindowInvalid {
                    current_time,
                    window,
                })
            }
            Verdict::Invalid(reason) => {
                persist(&NotaryClientState::Rejected)?;
                Err(FlowError::Validation(format!("{notary} refused: {reason}")))
            }
        }
    }
}

/// The stored transactions producing `stx`'s inputs and references.
pub(crate) fn dependencies_of(
    ctx: &FlowContext,
    stx: &SignedTransaction,
) -> Result<Vec<SignedTransaction>, FlowError> {
    let producers: BTreeSet<_> = stx
        .tx()
        .inputs
        .iter()
        .chain(stx.tx().references.iter())
        .map(|r| r.txhash)
        .collect();
    let mut found = Vec::with_capacity(producers.len());
    for id in producers {
        if let Some(dep) = ctx.transactions.get(&id)? {
            found.push(dep);
        }
    }
    Ok(found)
}
