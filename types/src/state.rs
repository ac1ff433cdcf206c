//! Pointers to transaction outputs.

use crate::TransactionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pointer to a single output of a transaction; the unit of consumption
/// tracked for double-spend prevention.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateRef {
    pub txhash: TransactionId,
    pub index: u32,
}

impl StateRef {
    pub fn new(txhash: TransactionId, index: u32) -> Self {
        Self { txhash, index }
    }

    /// Fixed-width binary key: `txhash ++ index (big-endian)`.
    ///
    /// Big-endian keeps storage iteration ordered by `(txhash, index)`.
    pub fn to_key_bytes(&self) -> [u8; 36] {
        let mut key = [0u8; 36];
        key[..32].copy_from_slice(self.txhash.as_bytes());
        key[32..].copy_from_slice(&self.index.to_be_bytes());
        key
    }

    pub fn from_key_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 36 {
            return None;
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[..32]);
        let mut index = [0u8; 4];
        index.copy_from_slice(&bytes[32..]);
        Some(Self::new(TransactionId::new(hash), u32::from_be_bytes(index)))
    }
}

impl fmt::Debug for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateRef({:?}#{})", self.txhash, self.index)
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.txhash, self.index)
    }
}
