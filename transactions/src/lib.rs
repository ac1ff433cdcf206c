//! Transaction model for the notarization layer.
//!
//! - [`wire`]: the signed-over transaction body and its content id.
//! - [`signed`]: a body plus its signature set; extended only by copy.
//! - [`ledger`]: the resolved ("fully linked") form used for verification.
//! - [`verifier`]: the contract-verification collaborator.
//! - [`builder`]: convenience construction and signing.

pub mod builder;
pub mod error;
pub mod ledger;
pub mod signed;
pub mod verifier;
pub mod wire;

pub use builder::TransactionBuilder;
pub use error::TransactionError;
pub use ledger::{LedgerTransaction, StateAndRef};
pub use signed::SignedTransaction;
pub use verifier::{BasicVerifier, TransactionVerifier};
pub use wire::{Command, TransactionState, WireTransaction};
