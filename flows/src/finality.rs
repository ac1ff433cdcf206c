//! Finality: verify, notarise if needed, record, broadcast.
//!
//! States: `Verifying -> (Notarizing)? -> Recording -> Broadcasting -> Done`.
//! The whole flow value is checkpointed on every transition. Recording
//! strictly precedes broadcasting, so no recipient ever holds a transaction
//! the sender has not persisted.
//!
//! Cancellation is honoured until an accepted verdict has been received or,
//! on the path without a notary, until recording starts. A cancel requested
//! while a notarisation request is in flight is dropped if the verdict comes
//! back accepted: the notary has consumed the inputs by then. After the point
//! of no return a failure keeps the last checkpoint so the flow can be
//! resumed forward.

use seal_messages::{FlowMessage, TransactionPayload};
use seal_store::{Checkpoint, FlowId};
use seal_transactions::SignedTransaction;
use seal_types::{DigitalSignature, Party, PublicKey, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use crate::notary_client::dependencies_of;
use crate::{
    new_flow_id, Checkpointer, FlowContext, FlowError, FlowSession, NotaryClient,
    NotaryClientState, FINALITY_PROTOCOL,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalityState {
    Verifying,
    Notarizing(NotaryClientState),
    Recording,
    Broadcasting {
        /// Index into the recipient list of the next party to deliver to.
        next: usize,
        undelivered: Vec<Undelivered>,
    },
}

impl FinalityState {
    pub fn tag(&self) -> &'static str {
        match self {
            FinalityState::Verifying => "verifying",
            FinalityState::Notarizing(_) => "notarizing",
            FinalityState::Recording => "recording",
            FinalityState::Broadcasting { .. } => "broadcasting",
        }
    }

    /// Whether the flow has passed the point after which it only moves
    /// forward.
    fn is_committed(&self) -> bool {
        matches!(
            self,
            FinalityState::Notarizing(NotaryClientState::Accepted(_))
                | FinalityState::Recording
                | FinalityState::Broadcasting { .. }
        )
    }
}

/// A recipient that could not be reached after every retry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Undelivered {
    pub party: Party,
    pub reason: String,
}

/// The checkpointed value of one finality flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct FinalityRecord {
    transaction: SignedTransaction,
    /// Counterparties of caller-supplied sessions, if any were supplied.
    explicit_counterparties: Option<Vec<Party>>,
    extra_recipients: Vec<Party>,
    /// Fixed once verification has passed.
    recipients: Vec<Party>,
    state: FinalityState,
}

#[derive(Debug, Default)]
pub struct FinalityOptions {
    /// Sessions to broadcast over. When given, they are exactly the
    /// recipients, and must cover every participant.
    pub sessions: Option<Vec<FlowSession>>,
    /// Parties to inform in addition to the participants. Only valid
    /// without explicit sessions.
    pub extra_recipients: Vec<Party>,
}

impl FinalityOptions {
    pub fn with_sessions(sessions: Vec<FlowSession>) -> Self {
        Self {
            sessions: Some(sessions),
            extra_recipients: Vec::new(),
        }
    }

    pub fn with_extra_recipients(extra_recipients: Vec<Party>) -> Self {
        Self {
            sessions: None,
            extra_recipients,
        }
    }
}

/// A finalised transaction. Recipients in `undelivered` did not acknowledge
/// it and need re-delivery; the transaction itself is final regardless.
#[derive(Clone, Debug)]
pub struct FinalityOutcome {
    pub transaction: SignedTransaction,
    pub undelivered: Vec<Undelivered>,
}

impl FinalityOutcome {
    pub fn fully_delivered(&self) -> bool {
        self.undelivered.is_empty()
    }
}

#[derive(Debug, Default)]
struct CancelState {
    requested: bool,
    committed: bool,
}

/// Requests cancellation of a running finality flow.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    inner: Arc<Mutex<CancelState>>,
}

impl CancelHandle {
    /// Ask the flow to stop. Refused once the flow is past the point of no
    /// return.
    pub fn cancel(&self) -> Result<(), FlowError> {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if state.committed {
            return Err(FlowError::NotCancellable);
        }
        state.requested = true;
        Ok(())
    }

    fn check(&self) -> Result<(), FlowError> {
        if self.inner.lock().unwrap_or_else(PoisonError::into_inner).requested {
            return Err(FlowError::Cancelled);
        }
        Ok(())
    }

    /// Pass the point of no return unless cancellation got there first.
    fn commit(&self) -> Result<(), FlowError> {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if state.requested && !state.committed {
            return Err(FlowError::Cancelled);
        }
        state.committed = true;
        Ok(())
    }

    /// Pass the point of no return regardless of a pending request. Returns
    /// whether a cancel request was overridden.
    fn seal(&self) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let overridden = state.requested && !state.committed;
        state.requested = false;
        state.committed = true;
        overridden
    }

    fn is_committed(&self) -> bool {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).committed
    }
}

pub struct FinalityFlow {
    ctx: Arc<FlowContext>,
    checkpointer: Checkpointer,
    record: FinalityRecord,
    sessions: HashMap<Party, FlowSession>,
    cancel: CancelHandle,
}

impl FinalityFlow {
    pub fn new(ctx: Arc<FlowContext>, transaction: SignedTransaction, options: FinalityOptions) -> Self {
        let explicit_counterparties = options
            .sessions
            .as_ref()
            .map(|sessions| sessions.iter().map(|s| s.counterparty().clone()).collect());
        let sessions = options
            .sessions
            .unwrap_or_default()
            .into_iter()
            .map(|s| (s.counterparty().clone(), s))
            .collect();
        let record = FinalityRecord {
            transaction,
            explicit_counterparties,
            extra_recipients: options.extra_recipients,
            recipients: Vec::new(),
            state: FinalityState::Verifying,
        };
        Self::assemble(ctx, new_flow_id(), record, sessions)
    }

    /// Rebuild a flow from its last checkpoint. Caller-supplied sessions do
    /// not survive a restart; fresh ones are opened to the same parties.
    pub fn from_checkpoint(ctx: Arc<FlowContext>, checkpoint: &Checkpoint) -> Result<Self, FlowError> {
        if checkpoint.protocol != FINALITY_PROTOCOL {
            return Err(FlowError::Checkpoint(format!(
                "flow {} belongs to {}",
                checkpoint.flow_id, checkpoint.protocol
            )));
        }
        let record: FinalityRecord = Checkpointer::decode(checkpoint)?;
        let committed = record.state.is_committed();
        let flow = Self::assemble(ctx, checkpoint.flow_id, record, HashMap::new());
        if committed {
            flow.cancel.commit()?;
        }
        Ok(flow)
    }

    pub async fn resume(ctx: Arc<FlowContext>, checkpoint: &Checkpoint) -> Result<FinalityOutcome, FlowError> {
        Self::from_checkpoint(ctx, checkpoint)?.run().await
    }

    fn assemble(
        ctx: Arc<FlowContext>,
        flow_id: FlowId,
        record: FinalityRecord,
        sessions: HashMap<Party, FlowSession>,
    ) -> Self {
        let checkpointer = Checkpointer::new(
            Arc::clone(&ctx.checkpoints),
            Arc::clone(&ctx.clock),
            flow_id,
            FINALITY_PROTOCOL,
        );
        Self {
            ctx,
            checkpointer,
            record,
            sessions,
            cancel: CancelHandle::default(),
        }
    }

    pub fn flow_id(&self) -> FlowId {
        self.checkpointer.flow_id()
    }

    pub fn state(&self) -> &FinalityState {
        &self.record.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub async fn run(mut self) -> Result<FinalityOutcome, FlowError> {
        let flow = self.flow_id();
        let tx_id = self.record.transaction.id();
        tracing::debug!(%flow, %tx_id, state = self.record.state.tag(), "finality started");

        let result = match self.checkpointer.save(&self.record) {
            Ok(()) => self.drive().await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => {
                self.checkpointer.discard()?;
                tracing::info!(
                    %flow,
                    %tx_id,
                    undelivered = outcome.undelivered.len(),
                    "transaction finalised"
                );
            }
            Err(e) if self.cancel.is_committed() => {
                tracing::error!(%flow, %tx_id, error = %e, "finality failed after point of no return, checkpoint kept");
            }
            Err(e) => {
                if let Err(discard_err) = self.checkpointer.discard() {
                    tracing::warn!(%flow, error = %discard_err, "could not discard checkpoint");
                }
                tracing::warn!(%flow, %tx_id, error = %e, "finality failed");
            }
        }
        result
    }

    async fn drive(&mut self) -> Result<FinalityOutcome, FlowError> {
        loop {
            match self.record.state.clone() {
                FinalityState::Verifying => {
                    let needs_notary = self.verify()?;
                    self.cancel.check()?;
                    let next = if needs_notary {
                        FinalityState::Notarizing(NotaryClientState::Idle)
                    } else {
                        FinalityState::Recording
                    };
                    self.transition(next)?;
                }
                FinalityState::Notarizing(client_state) => {
                    let signature = self.notarise(client_state).await?;
                    self.cancel.seal();
                    self.record.transaction = self
                        .record
                        .transaction
                        .with_additional_signatures([signature]);
                    self.transition(FinalityState::Recording)?;
                }
                FinalityState::Recording => {
                    self.cancel.commit()?;
                    self.ctx.transactions.record(&self.record.transaction)?;
                    self.transition(FinalityState::Broadcasting {
                        next: 0,
                        undelivered: Vec::new(),
                    })?;
                }
                FinalityState::Broadcasting { next, undelivered } => {
                    let undelivered = self.broadcast(next, undelivered).await?;
                    return Ok(FinalityOutcome {
                        transaction: self.record.transaction.clone(),
                        undelivered,
                    });
                }
            }
        }
    }

    fn transition(&mut self, next: FinalityState) -> Result<(), FlowError> {
        tracing::debug!(
            flow = %self.flow_id(),
            from = self.record.state.tag(),
            to = next.tag(),
            "finality transition"
        );
        self.record.state = next;
        self.checkpointer.save(&self.record)
    }

    /// Check signatures and contracts, and fix the recipient list. Returns
    /// whether notarisation is still needed.
    fn verify(&mut self) -> Result<bool, FlowError> {
        let stx = &self.record.transaction;
        let notary_keys: Vec<PublicKey> = stx.tx().notary.iter().map(|n| n.owning_key).collect();
        stx.verify_signatures_except(&notary_keys)?;
        let ltx = self.ctx.verifier.resolve(stx)?;
        self.ctx.verifier.verify(&ltx)?;

        if let Some(explicit) = &self.record.explicit_counterparties {
            if let Some(me) = explicit.iter().find(|p| self.ctx.is_me(p)) {
                return Err(FlowError::Validation(format!(
                    "a session to this node's own identity {me} was supplied"
                )));
            }
        }

        let mut mandatory = BTreeSet::new();
        for participant in ltx.participants() {
            let party = self.ctx.identities.resolve(&participant).ok_or_else(|| {
                FlowError::Validation(format!(
                    "participant {} has no known well-known identity",
                    participant.owning_key()
                ))
            })?;
            if !self.ctx.is_me(&party) {
                mandatory.insert(party);
            }
        }

        let recipients: BTreeSet<Party> = match &self.record.explicit_counterparties {
            Some(explicit) => {
                if !self.record.extra_recipients.is_empty() {
                    return Err(FlowError::Validation(
                        "extra recipients cannot be combined with explicit sessions".into(),
                    ));
                }
                let covered: BTreeSet<&Party> = explicit.iter().collect();
                let missing: Vec<String> = mandatory
                    .iter()
                    .filter(|p| !covered.contains(p))
                    .map(|p| p.to_string())
                    .collect();
                if !missing.is_empty() {
                    return Err(FlowError::Validation(format!(
                        "no session supplied for participants: {}",
                        missing.join(", ")
                    )));
                }
                explicit.iter().cloned().collect()
            }
            None => {
                let mut all = mandatory;
                all.extend(
                    self.record
                        .extra_recipients
                        .iter()
                        .filter(|p| !self.ctx.is_me(p))
                        .cloned(),
                );
                all
            }
        };

        // Re-checks an existing notary signature rather than trusting its
        // presence.
        let needs_notary = stx.needs_notarization();
        self.record.recipients = recipients.into_iter().collect();
        Ok(needs_notary)
    }

    async fn notarise(&self, state: NotaryClientState) -> Result<DigitalSignature, FlowError> {
        let mut snapshot = self.record.clone();
        let checkpointer = &self.checkpointer;
        let cancel = &self.cancel;
        let flow = self.flow_id();
        let persist = move |client_state: &NotaryClientState| {
            match client_state {
                NotaryClientState::RequestSent { .. } => cancel.check()?,
                NotaryClientState::Accepted(_) => {
                    if cancel.seal() {
                        tracing::warn!(%flow, "cancel request arrived after the notary accepted, continuing");
                    }
                }
                _ => {}
            }
            snapshot.state = FinalityState::Notarizing(client_state.clone());
            checkpointer.save(&snapshot)
        };
        NotaryClient::new(&self.ctx)
            .notarise(&self.record.transaction, state, persist)
            .await
    }

    async fn broadcast(
        &mut self,
        next: usize,
        mut undelivered: Vec<Undelivered>,
    ) -> Result<Vec<Undelivered>, FlowError> {
        let transaction = self.record.transaction.clone();
        let payload = FlowMessage::TransactionPayload(Box::new(TransactionPayload {
            dependencies: dependencies_of(&self.ctx, &transaction)?,
            transaction,
        }));

        for index in next..self.record.recipients.len() {
            let recipient = self.record.recipients[index].clone();
            if let Err(e) = self.deliver(&recipient, &payload).await {
                tracing::warn!(
                    tx_id = %self.record.transaction.id(),
                    %recipient,
                    error = %e,
                    "recipient did not acknowledge"
                );
                undelivered.push(Undelivered {
                    party: recipient,
                    reason: e.to_string(),
                });
            }
            self.transition(FinalityState::Broadcasting {
                next: index + 1,
                undelivered: undelivered.clone(),
            })?;
        }
        Ok(undelivered)
    }

    /// Send the payload to one recipient and wait for its `Ack`, retrying
    /// transport failures with backoff.
    async fn deliver(&mut self, recipient: &Party, payload: &FlowMessage) -> Result<(), FlowError> {
        let tx_id = self.record.transaction.id();
        let policy = self.ctx.retry;
        let mut last_error = None;

        for attempt in 1..=policy.attempts() {
            tokio::time::sleep(policy.backoff_before(attempt)).await;
            let session = match self.sessions.remove(recipient) {
                Some(session) => session,
                None => match self
                    .ctx
                    .registry
                    .open_session(recipient, FINALITY_PROTOCOL)
                    .await
                {
                    Ok(session) => session,
                    Err(e) if e.is_transient() => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };

            match exchange(session, payload).await {
                Ok(ack_id) if ack_id == tx_id => return Ok(()),
                Ok(other) => {
                    return Err(FlowError::Counterparty {
                        party: recipient.to_string(),
                        reason: format!("acknowledged {other} instead of {tx_id}"),
                    })
                }
                Err(e) if e.is_transient() => {
                    tracing::debug!(%recipient, attempt, error = %e, "delivery attempt failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| FlowError::Transport(format!("{recipient} unreachable"))))
    }
}

async fn exchange(
    mut session: FlowSession,
    payload: &FlowMessage,
) -> Result<TransactionId, FlowError> {
    match session.send_and_receive(payload).await? {
        FlowMessage::Ack(ack) => Ok(ack.tx_id),
        FlowMessage::Error(reason) => Err(FlowError::Counterparty {
            party: session.counterparty().to_string(),
            reason,
        }),
        other => Err(FlowError::UnexpectedMessage {
            expected: "Ack",
            received: other.kind(),
        }),
    }
}
