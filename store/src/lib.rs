//! Abstract storage traits for Seal.
//!
//! Every backend (LMDB, in-memory for testing) implements these traits and
//! the rest of the workspace depends only on them. Each write method must be
//! durable when it returns `Ok`.

pub mod checkpoint;
pub mod error;
pub mod meta;
pub mod transaction;
pub mod uniqueness;

pub use checkpoint::{Checkpoint, CheckpointStore, FlowId};
pub use error::StoreError;
pub use meta::MetaStore;
pub use transaction::TransactionStore;
pub use uniqueness::{UniquenessLog, UniquenessRecord};
