//! Typed, timed message exchange over one channel.

use seal_messages::{codec, FlowMessage};
use seal_network::Channel;
use seal_types::Party;
use std::time::Duration;

use crate::FlowError;

/// A session with one counterparty for one protocol run.
///
/// Owned by the flow that opened (or was handed) it; dropping it closes the
/// channel for both sides.
#[derive(Debug)]
pub struct FlowSession {
    channel: Channel,
    receive_timeout: Duration,
}

impl FlowSession {
    pub fn new(channel: Channel, receive_timeout: Duration) -> Self {
        Self {
            channel,
            receive_timeout,
        }
    }

    pub fn counterparty(&self) -> &Party {
        self.channel.counterparty()
    }

    pub async fn send(&self, message: &FlowMessage) -> Result<(), FlowError> {
        let bytes = codec::encode(message)?;
        self.channel.send(bytes).await?;
        Ok(())
    }

    /// Wait for the next message, failing with a transport error after the
    /// receive timeout.
    pub async fn receive(&mut self) -> Result<FlowMessage, FlowError> {
        let bytes = tokio::time::timeout(self.receive_timeout, self.channel.receive())
            .await
            .map_err(|_| {
                FlowError::Transport(format!(
                    "no reply from {} within {:?}",
                    self.channel.counterparty(),
                    self.receive_timeout
                ))
            })??;
        Ok(codec::decode(&bytes)?)
    }

    pub async fn send_and_receive(&mut self, message: &FlowMessage) -> Result<FlowMessage, FlowError> {
        self.send(message).await?;
        self.receive().await
    }
}
