use seal_messages::{CodecError, NotaryConflict};
use seal_network::TransportError;
use seal_notary::NotaryError;
use seal_store::StoreError;
use seal_transactions::TransactionError;
use seal_types::{TimeWindow, Timestamp};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Malformed input, missing signatures or missing sessions.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// A real double spend. Never retried.
    #[error("notarisation conflict: {0}")]
    NotarizationConflict(NotaryConflict),

    #[error("notary time {current_time} is outside time window {window}")]
    TimeWindowInvalid {
        current_time: Timestamp,
        window: TimeWindow,
    },

    /// A session could not be opened or a round trip did not complete.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("notary failure: {0}")]
    Notary(#[from] NotaryError),

    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),

    #[error("expected {expected}, received {received}")]
    UnexpectedMessage {
        expected: &'static str,
        received: &'static str,
    },

    #[error("{party} refused: {reason}")]
    Counterparty { party: String, reason: String },

    #[error("checkpoint unusable: {0}")]
    Checkpoint(String),

    #[error("flow cancelled")]
    Cancelled,

    #[error("flow is past the point of no return and cannot be cancelled")]
    NotCancellable,
}

impl FlowError {
    /// Whether repeating the same idempotent request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FlowError::Transport(_))
    }
}

impl From<TransportError> for FlowError {
    fn from(e: TransportError) -> Self {
        FlowError::Transport(e.to_string())
    }
}

impl From<TransactionError> for FlowError {
    fn from(e: TransactionError) -> Self {
        match e {
            TransactionError::ContractViolation { reason, .. } => FlowError::ContractViolation(reason),
            other => FlowError::Validation(other.to_string()),
        }
    }
}
