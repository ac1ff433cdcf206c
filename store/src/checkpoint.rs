//! Persisted state of suspended flows.

use crate::StoreError;
use seal_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one flow instance across restarts.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowId(pub [u8; 16]);

impl FlowId {
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlowId({self})")
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..6] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// A serialised flow state machine value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub flow_id: FlowId,
    /// Name of the protocol, used to pick the resume routine.
    pub protocol: String,
    /// Encoded state value (state tag plus accumulated data).
    pub state: Vec<u8>,
    pub updated_at: Timestamp,
}

/// Durable checkpoint storage. `put` replaces any previous checkpoint of the
/// same flow.
pub trait CheckpointStore: Send + Sync {
    fn put(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

    fn get(&self, flow_id: &FlowId) -> Result<Option<Checkpoint>, StoreError>;

    fn remove(&self, flow_id: &FlowId) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<Checkpoint>, StoreError>;
}
