//! Cryptographic primitives for Seal.
//!
//! - **Ed25519** for party and notary signatures
//! - **Blake2b-256** for transaction ids
//!
//! Signatures over a transaction id are the only thing a notary ever signs;
//! see [`sign::sign_transaction_id`].

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi, transaction_id_of};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, sign_transaction_id, verify_signature, verify_transaction_signature};
