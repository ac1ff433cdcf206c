//! Session message envelope and its bincode framing.

use crate::{Ack, NotarizationPayload, NotarizationResponse, TransactionPayload};
use seal_types::DigitalSignature;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on an encoded message.
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("message of {size} bytes exceeds limit of {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Every message a flow session carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowMessage {
    NotarizationRequest(NotarizationPayload),
    NotarizationResponse(NotarizationResponse),
    TransactionPayload(Box<TransactionPayload>),
    Ack(Ack),
    /// A transaction proposal the counterparty is asked to sign, with the
    /// transactions needed to resolve it.
    SignatureRequest(Box<TransactionPayload>),
    /// The counterparty's signature over the proposal's id.
    Signature(DigitalSignature),
    /// The sender could not process the previous message.
    Error(String),
}

impl FlowMessage {
    /// Short variant name, used in logs and unexpected-message errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowMessage::NotarizationRequest(_) => "NotarizationRequest",
            FlowMessage::NotarizationResponse(_) => "NotarizationResponse",
            FlowMessage::TransactionPayload(_) => "TransactionPayload",
            FlowMessage::Ack(_) => "Ack",
            FlowMessage::SignatureRequest(_) => "SignatureRequest",
            FlowMessage::Signature(_) => "Signature",
            FlowMessage::Error(_) => "Error",
        }
    }
}

pub fn encode(message: &FlowMessage) -> Result<Vec<u8>, CodecError> {
    let bytes = bincode::serialize(message).map_err(|e| CodecError::Malformed(e.to_string()))?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::TooLarge {
            size: bytes.len(),
            limit: MAX_MESSAGE_SIZE,
        });
    }
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<FlowMessage, CodecError> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::TooLarge {
            size: bytes.len(),
            limit: MAX_MESSAGE_SIZE,
        });
    }
    bincode::deserialize(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
}
