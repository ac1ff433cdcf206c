//! Blake2b hashing for transaction ids.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use seal_types::TransactionId;

type Blake2b256 = Blake2b<U32>;

/// Domain tag mixed into every transaction id.
const TX_ID_DOMAIN: &[u8] = b"seal-tx-v1";

/// 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    blake2b_256_multi(&[data])
}

/// Hash several byte slices in sequence without concatenating them.
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Derive a `TransactionId` from the canonical encoding of a transaction body.
pub fn transaction_id_of(body_bytes: &[u8]) -> TransactionId {
    TransactionId::new(blake2b_256_multi(&[TX_ID_DOMAIN, body_bytes]))
}
