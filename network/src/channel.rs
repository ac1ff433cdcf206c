//! Channels and the transport contract.

use async_trait::async_trait;
use seal_types::Party;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::memory::Faults;
use crate::TransportError;

/// Messages buffered per direction before `send` waits.
pub const CHANNEL_CAPACITY: usize = 64;

/// Opens sessions to other parties.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The identity this transport speaks for.
    fn local_party(&self) -> &Party;

    /// Open a fresh channel to `counterparty`, announcing `protocol`.
    async fn open(&self, counterparty: &Party, protocol: &str) -> Result<Channel, TransportError>;
}

/// A session opened at this node by someone else.
#[derive(Debug)]
pub struct InboundSession {
    pub protocol: String,
    pub initiator: Party,
    pub channel: Channel,
}

/// One end of an ordered, bidirectional byte channel.
///
/// Dropping either end closes the session for both.
#[derive(Debug)]
pub struct Channel {
    local: Party,
    counterparty: Party,
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: mpsc::Receiver<Vec<u8>>,
    faults: Option<Arc<Faults>>,
}

impl Channel {
    /// Two connected ends: the first belongs to `a`, the second to `b`.
    pub fn pair(a: Party, b: Party) -> (Channel, Channel) {
        Self::pair_with_faults(a, b, None)
    }

    pub(crate) fn pair_with_faults(
        a: Party,
        b: Party,
        faults: Option<Arc<Faults>>,
    ) -> (Channel, Channel) {
        let (a_tx, b_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (b_tx, a_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let a_end = Channel {
            local: a.clone(),
            counterparty: b.clone(),
            outbound: a_tx,
            inbound: a_rx,
            faults: faults.clone(),
        };
        let b_end = Channel {
            local: b,
            counterparty: a,
            outbound: b_tx,
            inbound: b_rx,
            faults,
        };
        (a_end, b_end)
    }

    pub fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    pub async fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        if let Some(faults) = &self.faults {
            if faults.take_dropped_send(&self.local.owning_key) {
                tracing::debug!(from = %self.local, to = %self.counterparty, "dropping message");
                return Ok(());
            }
        }
        self.outbound
            .send(bytes)
            .await
            .map_err(|_| TransportError::Closed(self.counterparty.to_string()))
    }

    /// Wait for the next message. Fails once the other end is gone.
    pub async fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| TransportError::Closed(self.counterparty.to_string()))
    }
}
