//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the notary and the flows (clock, durable
//! storage, contract verification) sits behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (advance time, inject failures)
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod store;
pub mod verifier;

pub use clock::NullClock;
pub use store::{NullCheckpointStore, NullTransactionStore, NullUniquenessLog};
pub use verifier::NullVerifier;
