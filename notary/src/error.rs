use seal_store::StoreError;
use thiserror::Error;

/// Failures of the notary itself, as opposed to verdicts about a request.
#[derive(Debug, Error)]
pub enum NotaryError {
    #[error("consumed-state log unavailable: {0}")]
    Storage(#[from] StoreError),

    #[error("notary misconfigured: {0}")]
    Misconfigured(String),
}
