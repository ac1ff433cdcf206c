//! LMDB storage backend for Seal.
//!
//! Implements every trait from `seal-store` using the `heed` LMDB bindings.
//! All logical stores live as named databases inside one environment; every
//! write is a single LMDB write transaction, committed (and fsynced) before
//! the call returns.

pub mod checkpoint;
pub mod environment;
pub mod error;
pub mod meta;
pub mod migration;
pub mod transaction;
pub mod uniqueness;

pub use checkpoint::LmdbCheckpointStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use meta::LmdbMetaStore;
pub use migration::Migrator;
pub use transaction::LmdbTransactionStore;
pub use uniqueness::LmdbUniquenessLog;
