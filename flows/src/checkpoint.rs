//! Persistence of flow state values.

use rand::RngCore;
use seal_store::{Checkpoint, CheckpointStore, FlowId};
use seal_types::Clock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::FlowError;

pub fn new_flow_id() -> FlowId {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    FlowId(bytes)
}

/// Writes one flow's state value at each transition.
pub struct Checkpointer {
    store: Arc<dyn CheckpointStore>,
    clock: Arc<dyn Clock>,
    flow_id: FlowId,
    protocol: &'static str,
}

impl Checkpointer {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        clock: Arc<dyn Clock>,
        flow_id: FlowId,
        protocol: &'static str,
    ) -> Self {
        Self {
            store,
            clock,
            flow_id,
            protocol,
        }
    }

    pub fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    /// Durably replace the flow's checkpoint with `state`.
    pub fn save<S: Serialize>(&self, state: &S) -> Result<(), FlowError> {
        let encoded =
            bincode::serialize(state).map_err(|e| FlowError::Checkpoint(e.to_string()))?;
        self.store.put(&Checkpoint {
            flow_id: self.flow_id,
            protocol: self.protocol.to_string(),
            state: encoded,
            updated_at: self.clock.now(),
        })?;
        tracing::trace!(flow = %self.flow_id, protocol = self.protocol, "checkpoint saved");
        Ok(())
    }

    /// Remove the checkpoint of a flow that has finished.
    pub fn discard(&self) -> Result<(), FlowError> {
        self.store.remove(&self.flow_id)?;
        Ok(())
    }

    pub fn decode<S: DeserializeOwned>(checkpoint: &Checkpoint) -> Result<S, FlowError> {
        bincode::deserialize(&checkpoint.state).map_err(|e| {
            FlowError::Checkpoint(format!("flow {}: {}", checkpoint.flow_id, e))
        })
    }
}
