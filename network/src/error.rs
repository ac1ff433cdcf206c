use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("party {0} unreachable")]
    Unreachable(String),

    #[error("session closed by {0}")]
    Closed(String),
}
