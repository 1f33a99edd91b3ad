//! Payload codec seam.
//!
//! Command payloads are schema-encoded by a collaborator behind this narrow
//! interface. The rest of the client treats payloads as opaque bytes, except
//! resolved-event envelopes, which [`crate::event`] unpacks for delivery.

use bincode::config;
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Errors from payload encode/decode.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("failed to encode JSON event data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a command payload message to wire bytes.
///
/// # Errors
/// Returns an error if the message cannot be serialised.
pub fn encode<M: Serialize>(message: &M) -> Result<Bytes, CodecError> {
    let bytes = bincode::serde::encode_to_vec(message, config::standard())?;
    Ok(Bytes::from(bytes))
}

/// Decode a command payload message from wire bytes.
///
/// # Errors
/// Returns an error if the bytes do not parse as the expected message.
pub fn decode<M: DeserializeOwned>(bytes: &[u8]) -> Result<M, CodecError> {
    let (message, _consumed) = bincode::serde::decode_from_slice(bytes, config::standard())?;
    Ok(message)
}
