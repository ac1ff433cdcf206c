//! Fundamental types for the Seal notarization layer.
//!
//! This crate defines the identifiers and value types shared by every other
//! crate in the workspace: transaction ids, state references, keys and
//! signatures, parties, timestamps and time windows.

pub mod hash;
pub mod keys;
pub mod party;
pub mod state;
pub mod time;

pub use hash::TransactionId;
pub use keys::{DigitalSignature, KeyPair, PrivateKey, PublicKey, Signature};
pub use party::{AbstractParty, Party};
pub use state::StateRef;
pub use time::{Clock, SystemClock, TimeWindow, Timestamp};
