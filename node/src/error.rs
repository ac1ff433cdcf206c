use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store error: {0}")]
    Store(#[from] seal_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] seal_store_lmdb::LmdbError),

    #[error("notary error: {0}")]
    Notary(#[from] seal_notary::NotaryError),

    #[error("flow error: {0}")]
    Flow(#[from] seal_flows::FlowError),

    #[error("handler registration: {0}")]
    Registry(#[from] seal_flows::RegistryError),

    #[error("config error: {0}")]
    Config(String),

    #[error("flow task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
