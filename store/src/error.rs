use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    /// An append-only key was written twice. Nothing from the batch was kept.
    #[error("write conflict on append-only key: {0}")]
    WriteConflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}
